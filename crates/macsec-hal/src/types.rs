//! Port numbers and type-safe register addresses.
//!
//! Every MACsec register lives in one of a handful of blocks (global control,
//! SecY table, rule table, SA tables, counters). `Csr<B>` carries its block as
//! a phantom type so an SA-table offset can never be handed to code expecting
//! a SecY-table offset.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Board-level port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNo(u32);

impl PortNo {
    pub const fn new(port: u32) -> Self {
        PortNo(port)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PortNo {
    fn from(port: u32) -> Self {
        PortNo(port)
    }
}

/// Untyped register address: MMD device plus 32-bit register address, as
/// consumed by a register transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RawCsr {
    pub mmd: u16,
    pub addr: u32,
}

impl RawCsr {
    pub const fn new(mmd: u16, addr: u32) -> Self {
        RawCsr { mmd, addr }
    }

    /// Address `words` registers further on in the same device.
    pub const fn offset(&self, words: u32) -> Self {
        RawCsr {
            mmd: self.mmd,
            addr: self.addr + words,
        }
    }
}

impl fmt::Display for RawCsr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:08x}", self.mmd, self.addr)
    }
}

/// Marker trait for register blocks.
pub trait CsrBlock: Send + Sync + 'static {
    /// MMD device hosting the block.
    const MMD: u16;
    /// First register address of the block.
    const BASE: u32;

    fn block_name() -> &'static str;
}

/// A register address inside block `B`.
#[derive(Clone, Copy)]
pub struct Csr<B: CsrBlock> {
    offset: u32,
    _marker: PhantomData<B>,
}

impl<B: CsrBlock> Csr<B> {
    pub const fn new(offset: u32) -> Self {
        Self {
            offset,
            _marker: PhantomData,
        }
    }

    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// The same block, `words` registers further on.
    pub const fn add(&self, words: u32) -> Self {
        Self::new(self.offset + words)
    }

    pub const fn raw(&self) -> RawCsr {
        RawCsr::new(B::MMD, B::BASE + self.offset)
    }
}

impl<B: CsrBlock> fmt::Debug for Csr<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(+0x{:04x})", B::block_name(), self.offset)
    }
}

impl<B: CsrBlock> PartialEq for Csr<B> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl<B: CsrBlock> Eq for Csr<B> {}

impl<B: CsrBlock> From<Csr<B>> for RawCsr {
    fn from(csr: Csr<B>) -> Self {
        csr.raw()
    }
}

macro_rules! define_csr_block {
    ($name:ident, $block_name:literal, $mmd:expr, $base:expr) => {
        #[doc = concat!("Marker type for the ", $block_name, " register block.")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl CsrBlock for $name {
            const MMD: u16 = $mmd;
            const BASE: u32 = $base;

            fn block_name() -> &'static str {
                $block_name
            }
        }
    };
}

define_csr_block!(GlobalBlock, "Global", 0x1f, 0x0000);
define_csr_block!(SecyBlock, "Secy", 0x1f, 0x1000);
define_csr_block!(RuleBlock, "Rule", 0x1f, 0x2000);
define_csr_block!(TxSaBlock, "TxSa", 0x1e, 0x0000);
define_csr_block!(RxScBlock, "RxSc", 0x1d, 0x0000);
define_csr_block!(RxSaBlock, "RxSa", 0x1d, 0x1000);
define_csr_block!(CounterBlock, "Counter", 0x1c, 0x0000);
