//! Emulated MACsec PHY.
//!
//! [`SimPhy`] is a per-port register file that behaves like the MACsec
//! block as far as the register driver can tell: sticky write-one-to-clear
//! event status, a key-load busy bit that clears after a configurable number
//! of polls, and a one-shot capture buffer. Faults can be injected so callers
//! see `PhyStatus` failures mid-sequence.
//!
//! The [`datapath`] module pushes frames through whatever the control plane
//! programmed, which lets tests observe classification, packet-number
//! consumption, sequence events and counters end to end.

pub mod datapath;
mod phy;

pub use datapath::{DropReason, Verdict};
pub use phy::SimPhy;
