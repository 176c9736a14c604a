//! Register transport and exclusion seams.

use crate::error::PhyStatus;
use crate::types::{PortNo, RawCsr};

/// Register access to the PHY, addressed by port and MMD/address pair.
///
/// Implementations own wire-level details (MDIO clause 45, SPI, ...).
pub trait RegisterTransport: Send + Sync {
    fn read(&self, port: PortNo, csr: RawCsr) -> Result<u32, PhyStatus>;

    fn write(&self, port: PortNo, csr: RawCsr, value: u32) -> Result<(), PhyStatus>;
}

/// Paired enter/exit exclusion scoping one configuration call.
pub trait Exclusion: Send + Sync {
    fn enter(&self);

    fn exit(&self);
}

/// No-op exclusion for single-threaded callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExclusion;

impl Exclusion for NoExclusion {
    fn enter(&self) {}

    fn exit(&self) {}
}

/// Holds an [`Exclusion`] for its lifetime; `exit` runs on drop, including on
/// early return through `?`.
pub struct ExclusionGuard<'a> {
    exclusion: &'a dyn Exclusion,
}

impl<'a> ExclusionGuard<'a> {
    pub fn enter(exclusion: &'a dyn Exclusion) -> Self {
        exclusion.enter();
        ExclusionGuard { exclusion }
    }
}

impl Drop for ExclusionGuard<'_> {
    fn drop(&mut self) {
        self.exclusion.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingExclusion {
        depth: AtomicI32,
        entries: AtomicU32,
    }

    impl Exclusion for CountingExclusion {
        fn enter(&self) {
            self.depth.fetch_add(1, Ordering::SeqCst);
            self.entries.fetch_add(1, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn failing_call(excl: &CountingExclusion) -> Result<(), PhyStatus> {
        let _guard = ExclusionGuard::enter(excl);
        Err::<(), _>(PhyStatus::Busy)?;
        Ok(())
    }

    #[test]
    fn test_guard_exits_on_error_path() {
        let excl = CountingExclusion::default();
        assert!(failing_call(&excl).is_err());
        assert_eq!(excl.depth.load(Ordering::SeqCst), 0);
        assert_eq!(excl.entries.load(Ordering::SeqCst), 1);
    }
}
