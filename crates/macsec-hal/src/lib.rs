//! Hardware abstraction for PHY-attached MACsec engines.
//!
//! The control plane never touches registers directly. It programs the
//! engine through the [`MacsecDriver`] trait, and the register-map backend
//! ([`RegisterDriver`]) turns each call into clause-45 register accesses over
//! a caller-supplied [`RegisterTransport`].
//!
//! # Architecture
//!
//! - [`types`]: port numbers and typed register addresses
//! - [`error`]: PHY return codes and the MACsec error type
//! - [`family`]: PHY family detection and per-family capabilities
//! - [`conf`]: configuration records shared by driver and control plane
//! - [`classify`]: frame model, match patterns and rule precedence
//! - [`counters`]: statistics groups
//! - [`regs`]: register layout of the MACsec tables
//! - [`transport`]: register access and board-level mutual exclusion
//! - [`api`]: the driver trait and its register-map implementation

pub mod api;
pub mod classify;
pub mod conf;
pub mod counters;
pub mod error;
pub mod family;
pub mod regs;
pub mod transport;
pub mod types;

pub use api::{MacsecDriver, PollConfig, RegisterDriver};
pub use classify::{Frame, MatchPattern, MatchPriority, SecTag, TagMatch};
pub use conf::{
    BypassMode, CapturedFrame, ControlFrameMatch, DefaultAction, DefaultActionPolicy, Direction,
    EventMask, FrameCapture, InitConf, MacBlock, MatchAction, RxScConf, SecyConf, TagBypass,
    TxScConf, ValidateFrames,
};
pub use counters::{
    CounterGroup, CounterSet, MacCounters, PortCounters, RxSaCounters, RxScCounters,
    SecyCounters, TxSaCounters, TxScCounters,
};
pub use error::{MacsecError, MacsecResult, PhyStatus, PhyStatusExt};
pub use family::{Capabilities, PhyFamily, PortInfo};
pub use transport::{Exclusion, ExclusionGuard, NoExclusion, RegisterTransport};
pub use types::{Csr, CsrBlock, PortNo, RawCsr};
