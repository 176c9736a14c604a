//! MACsec PHY control plane
//!
//! Configures IEEE 802.1AE engines embedded in Ethernet PHYs: SecYs,
//! transmit and receive secure channels, secure associations with their
//! keys and packet numbers, frame classification, sequence events and
//! statistics.
//!
//! # Architecture
//!
//! ```text
//! [caller] ──> [MacsecBoard] ──> [MacsecDriver] ──> [RegisterTransport] ──> [PHY]
//!                   │
//!                   └──> [run_monitor] (periodic event tick)
//! ```
//!
//! # Key Components
//!
//! - [`macsec::MacsecBoard`]: per-port registry and the operation set
//! - [`config::MacsecCtlConfig`]: tunables loaded from JSON
//! - [`audit`]: structured audit records and logging macros

pub mod audit;
pub mod config;
pub mod macsec;

pub use config::{ConfigError, MacsecCtlConfig};
pub use macsec::{
    run_monitor, EngineStatus, MacsecBoard, MacsecStats, PortStatus, PortStatusEntry, Resolution,
    RxSaInfo, RxScStatus, SaState, SaStatus, SecyId, TxSaInfo, TxScStatus,
};
