//! Handles, status records and the per-port registry entries.

use chrono::{DateTime, Utc};
use macsec_hal::{
    DefaultAction, Direction, MatchAction, MatchPattern, PortNo, RxScConf, SecyConf, TxScConf,
};
use macsec_types::{AssocNum, PacketNumber, PnWidth, Sak, Sci, Ssci};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// SecY handle.
///
/// `port_id` is the value carried in the SCI; `service_id` tells apart
/// several SecYs on one physical port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecyId {
    pub port: PortNo,
    pub service_id: u16,
    pub port_id: u16,
}

impl SecyId {
    pub const fn new(port: PortNo, service_id: u16, port_id: u16) -> Self {
        SecyId {
            port,
            service_id,
            port_id,
        }
    }
}

impl fmt::Display for SecyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "port{}/svc{}/pid{}",
            self.port, self.service_id, self.port_id
        )
    }
}

/// SA lifecycle state. An absent SA has no entry at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaState {
    Configured,
    Active,
    Disabled,
}

impl fmt::Display for SaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaState::Configured => write!(f, "configured"),
            SaState::Active => write!(f, "active"),
            SaState::Disabled => write!(f, "disabled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineStatus {
    pub capable: bool,
    pub enabled: bool,
    pub bypassed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortStatusEntry {
    pub mac_enabled: bool,
    pub mac_operational: bool,
    pub point_to_point: bool,
}

/// 802.1AE port status of one SecY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortStatus {
    pub controlled: PortStatusEntry,
    pub uncontrolled: PortStatusEntry,
    pub common: PortStatusEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxScStatus {
    pub sci: Sci,
    pub transmitting: bool,
    pub encoding_sa: Option<AssocNum>,
    /// Encoding SA when it encrypts, `None` for integrity-only.
    pub enciphering_sa: Option<AssocNum>,
    pub created_time: DateTime<Utc>,
    pub started_time: Option<DateTime<Utc>>,
    pub stopped_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RxScStatus {
    pub receiving: bool,
    pub created_time: DateTime<Utc>,
    pub started_time: Option<DateTime<Utc>>,
    pub stopped_time: Option<DateTime<Utc>>,
}

/// Transmit SA as returned by `tx_sa_get`. `next_pn` is read from hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSaInfo {
    pub next_pn: PacketNumber,
    pub confidentiality: bool,
    pub key: Sak,
    pub active: bool,
    pub ssci: Option<Ssci>,
}

/// Receive SA as returned by `rx_sa_get`. `lowest_pn` is read from hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxSaInfo {
    pub lowest_pn: PacketNumber,
    pub key: Sak,
    pub active: bool,
    pub ssci: Option<Ssci>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaStatus {
    /// Tx: the SA is the encoding SA. Rx: the SA is active.
    pub in_use: bool,
    pub state: SaState,
    /// `next_pn` for Tx, `lowest_pn` for Rx.
    pub pn: PacketNumber,
    pub created_time: DateTime<Utc>,
    pub started_time: Option<DateTime<Utc>>,
    pub stopped_time: Option<DateTime<Utc>>,
}

/// Outcome of classifying a frame against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Engine in bypass mode; every frame passes unmodified.
    Bypassed,
    Rule { secy: SecyId, action: MatchAction },
    /// No rule matched. Unmatched non-MACsec ingress frames on a port
    /// dropping them resolve to `Default(DefaultAction::Drop)`.
    Default(DefaultAction),
}

/// Board-wide operation counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MacsecStats {
    pub ports_attached: u64,
    pub secys_created: u64,
    pub scs_created: u64,
    pub sas_installed: u64,
    pub sas_deleted: u64,
    pub key_installs_failed: u64,
    pub events_reported: u64,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub(crate) struct SaEntry {
    pub state: SaState,
    pub key: Sak,
    pub ssci: Option<Ssci>,
    pub confidential: bool,
    pub created: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub stopped: Option<DateTime<Utc>>,
    /// Activation order within the channel; the latest active SA encodes.
    pub activated_seq: u64,
}

impl SaEntry {
    pub fn new(key: Sak, ssci: Option<Ssci>, confidential: bool) -> Self {
        SaEntry {
            state: SaState::Configured,
            key,
            ssci,
            confidential,
            created: Utc::now(),
            started: None,
            stopped: None,
            activated_seq: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == SaState::Active
    }
}

/// The four AN positions of one channel.
#[derive(Default)]
pub(crate) struct SaTable([Option<SaEntry>; AssocNum::COUNT]);

impl SaTable {
    pub fn get(&self, an: AssocNum) -> Option<&SaEntry> {
        self.0[an.index()].as_ref()
    }

    pub fn get_mut(&mut self, an: AssocNum) -> Option<&mut SaEntry> {
        self.0[an.index()].as_mut()
    }

    pub fn insert(&mut self, an: AssocNum, entry: SaEntry) -> Option<SaEntry> {
        self.0[an.index()].replace(entry)
    }

    pub fn remove(&mut self, an: AssocNum) -> Option<SaEntry> {
        self.0[an.index()].take()
    }

    pub fn ans(&self) -> Vec<AssocNum> {
        AssocNum::ALL
            .into_iter()
            .filter(|an| self.get(*an).is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    pub fn any_active(&self) -> bool {
        self.0.iter().flatten().any(SaEntry::is_active)
    }

    /// Active SA activated most recently.
    pub fn latest_active(&self) -> Option<AssocNum> {
        AssocNum::ALL
            .into_iter()
            .filter_map(|an| self.get(an).filter(|sa| sa.is_active()).map(|sa| (an, sa)))
            .max_by_key(|(_, sa)| sa.activated_seq)
            .map(|(an, _)| an)
    }
}

pub(crate) struct TxScEntry {
    pub conf: Option<TxScConf>,
    pub sas: SaTable,
    pub created: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub stopped: Option<DateTime<Utc>>,
    pub activations: u64,
}

impl TxScEntry {
    pub fn new() -> Self {
        TxScEntry {
            conf: None,
            sas: SaTable::default(),
            created: Utc::now(),
            started: None,
            stopped: None,
            activations: 0,
        }
    }

    pub fn effective_conf(&self, secy: &SecyConf) -> TxScConf {
        self.conf.unwrap_or_else(|| TxScConf::from_secy(secy))
    }

    pub fn encoding_an(&self) -> Option<AssocNum> {
        self.sas.latest_active()
    }
}

pub(crate) struct RxScEntry {
    pub rx_slot: u8,
    pub conf: Option<RxScConf>,
    pub sas: SaTable,
    pub created: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub stopped: Option<DateTime<Utc>>,
}

impl RxScEntry {
    pub fn new(rx_slot: u8) -> Self {
        RxScEntry {
            rx_slot,
            conf: None,
            sas: SaTable::default(),
            created: Utc::now(),
            started: None,
            stopped: None,
        }
    }

    pub fn effective_conf(&self, secy: &SecyConf) -> RxScConf {
        self.conf.unwrap_or_else(|| RxScConf::from_secy(secy))
    }
}

pub(crate) struct SecyEntry {
    pub slot: u8,
    pub conf: SecyConf,
    pub controlled: bool,
    pub patterns: BTreeMap<(Direction, MatchAction), MatchPattern>,
    pub tx_sc: Option<TxScEntry>,
    pub rx_scs: BTreeMap<Sci, RxScEntry>,
}

impl SecyEntry {
    pub fn new(slot: u8, conf: SecyConf) -> Self {
        SecyEntry {
            slot,
            conf,
            controlled: false,
            patterns: BTreeMap::new(),
            tx_sc: None,
            rx_scs: BTreeMap::new(),
        }
    }

    pub fn pn_width(&self) -> PnWidth {
        self.conf.cipher_suite.pn_width()
    }

    pub fn has_sas(&self) -> bool {
        self.tx_sc.as_ref().map_or(false, |tx| !tx.sas.is_empty())
            || self.rx_scs.values().any(|rx| !rx.sas.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sa(state: SaState, seq: u64) -> SaEntry {
        let mut entry = SaEntry::new(Sak::new(&[1; 16], [2; 16]).unwrap(), None, true);
        entry.state = state;
        entry.activated_seq = seq;
        entry
    }

    #[test]
    fn test_secy_id_display() {
        let id = SecyId::new(PortNo::new(3), 0, 1);
        assert_eq!(id.to_string(), "port3/svc0/pid1");
    }

    #[test]
    fn test_latest_active_picks_most_recent_activation() {
        let mut table = SaTable::default();
        assert_eq!(table.latest_active(), None);
        table.insert(AssocNum::AN0, sa(SaState::Active, 1));
        table.insert(AssocNum::AN1, sa(SaState::Active, 2));
        table.insert(AssocNum::AN2, sa(SaState::Disabled, 3));
        assert_eq!(table.latest_active(), Some(AssocNum::AN1));

        table.remove(AssocNum::AN1);
        assert_eq!(table.latest_active(), Some(AssocNum::AN0));
        assert_eq!(table.ans(), vec![AssocNum::AN0, AssocNum::AN2]);
    }

    #[test]
    fn test_has_sas_looks_at_both_directions() {
        let conf = SecyConf::default();
        let mut secy = SecyEntry::new(0, conf);
        assert!(!secy.has_sas());

        let mut rx = RxScEntry::new(0);
        rx.sas.insert(AssocNum::AN3, sa(SaState::Configured, 0));
        secy.rx_scs.insert(Sci::from_u64(1), rx);
        assert!(secy.has_sas());
    }
}
