//! MACsec control plane for PHY-attached engines.
//!
//! [`MacsecBoard`] owns one registry entry per attached port and exposes the
//! full operation set as `&self` methods. The methods are split by concern:
//!
//! - `board`: attach/detach, engine enable and bypass, MTU, capture, raw CSR
//! - `secy`: SecY registry, controlled port, 802.1AE port status
//! - `classify`: per-SecY match rules, default policy, control-frame rules
//! - `channel`: transmit and receive secure channels
//! - `sa`: secure association lifecycle and packet numbers
//! - `monitor`: rollover / threshold events and the periodic tick
//! - `counters`: statistics groups
//!
//! Every call takes the port's lock and brackets its register traffic with
//! the board's [`Exclusion`](macsec_hal::Exclusion), so ports configure
//! independently while calls on one port are serialized.

mod board;
mod channel;
mod classify;
mod counters;
mod monitor;
mod sa;
mod secy;
mod types;

pub use board::MacsecBoard;
pub use monitor::run_monitor;
pub use types::{
    EngineStatus, MacsecStats, PortStatus, PortStatusEntry, Resolution, RxSaInfo, RxScStatus,
    SaState, SaStatus, SecyId, TxSaInfo, TxScStatus,
};

#[cfg(test)]
pub(crate) mod test_support {
    use super::{MacsecBoard, SecyId};
    use crate::config::MacsecCtlConfig;
    use macsec_hal::{BypassMode, PhyFamily, PortInfo, PortNo, SecyConf};
    use macsec_sim::SimPhy;
    use macsec_types::{CipherSuite, MacAddress, Sak};
    use std::sync::Arc;

    pub const PORT: PortNo = PortNo::new(3);

    pub fn local() -> MacAddress {
        MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])
    }

    pub fn peer() -> MacAddress {
        MacAddress::new([0x00, 0xaa, 0xbb, 0xcc, 0xdd, 0x01])
    }

    pub fn id() -> SecyId {
        SecyId::new(PORT, 0, 1)
    }

    pub fn secy_conf(cipher_suite: CipherSuite) -> SecyConf {
        SecyConf {
            mac_addr: local(),
            cipher_suite,
            always_include_sci: true,
            ..Default::default()
        }
    }

    pub fn key(len: usize) -> Sak {
        Sak::new(&vec![0x5a; len], [0x17; 16]).unwrap()
    }

    pub fn xpn_key(len: usize) -> Sak {
        Sak::with_salt(&vec![0x5a; len], [0x17; 16], [0x33; 12]).unwrap()
    }

    /// Board with one attached port, engine not yet enabled.
    pub fn attached(family: PhyFamily) -> (Arc<SimPhy>, MacsecBoard) {
        let sim = Arc::new(SimPhy::new());
        let mut board = MacsecBoard::new(sim.clone(), MacsecCtlConfig::default());
        board.attach_port(PORT, PortInfo::new(family, true)).unwrap();
        (sim, board)
    }

    /// Engine enabled and one SecY created with the given cipher suite.
    pub fn with_secy(family: PhyFamily, cipher_suite: CipherSuite) -> (Arc<SimPhy>, MacsecBoard) {
        let (sim, board) = attached(family);
        board.engine_init(PORT, true, BypassMode::Disable).unwrap();
        board.secy_create(id(), secy_conf(cipher_suite)).unwrap();
        (sim, board)
    }
}
