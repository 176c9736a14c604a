//! Flat driver interface.
//!
//! One method per hardware programming step. Every method has a default body
//! returning `NotImplemented`, so a backend for a family that lacks a feature
//! simply leaves the method out and callers see the uniform "feature absent"
//! result.

use crate::classify::MatchPattern;
use crate::conf::{
    CapturedFrame, ControlFrameMatch, DefaultActionPolicy, Direction, EventMask, FrameCapture,
    InitConf, MatchAction, TagBypass, TxScConf,
};
use crate::counters::CounterGroup;
use crate::error::{MacsecError, MacsecResult};
use crate::family::{Capabilities, PhyFamily};
use crate::regs::{RxScRecord, SaRecord, SaSlot, SecyRecord};
use crate::types::{PortNo, RawCsr};
use macsec_types::{AssocNum, Sak};

fn absent<T>(op: &str) -> MacsecResult<T> {
    Err(MacsecError::not_implemented(op))
}

pub trait MacsecDriver: Send + Sync {
    fn family(&self) -> PhyFamily;

    fn capabilities(&self) -> Capabilities {
        self.family().capabilities()
    }

    // Engine

    fn init_set(&self, _port: PortNo, _conf: &InitConf) -> MacsecResult<()> {
        absent("init_set")
    }

    fn init_get(&self, _port: PortNo) -> MacsecResult<InitConf> {
        absent("init_get")
    }

    fn mtu_write(&self, _port: PortNo, _mtu: u16) -> MacsecResult<()> {
        absent("mtu_write")
    }

    fn mtu_read(&self, _port: PortNo) -> MacsecResult<u16> {
        absent("mtu_read")
    }

    // SecY and channels

    fn secy_write(&self, _port: PortNo, _slot: u8, _record: &SecyRecord) -> MacsecResult<()> {
        absent("secy_write")
    }

    fn secy_clear(&self, _port: PortNo, _slot: u8) -> MacsecResult<()> {
        absent("secy_clear")
    }

    fn controlled_port_write(&self, _port: PortNo, _slot: u8, _enable: bool) -> MacsecResult<()> {
        absent("controlled_port_write")
    }

    fn tx_sc_write(&self, _port: PortNo, _slot: u8, _conf: &TxScConf) -> MacsecResult<()> {
        absent("tx_sc_write")
    }

    fn tx_sc_clear(&self, _port: PortNo, _slot: u8) -> MacsecResult<()> {
        absent("tx_sc_clear")
    }

    fn encoding_sa_write(
        &self,
        _port: PortNo,
        _slot: u8,
        _an: Option<AssocNum>,
    ) -> MacsecResult<()> {
        absent("encoding_sa_write")
    }

    fn tag_bypass_write(&self, _port: PortNo, _slot: u8, _bypass: TagBypass) -> MacsecResult<()> {
        absent("tag_bypass_write")
    }

    fn tag_bypass_read(&self, _port: PortNo, _slot: u8) -> MacsecResult<TagBypass> {
        absent("tag_bypass_read")
    }

    fn rx_sc_write(&self, _port: PortNo, _rx_slot: u8, _record: &RxScRecord) -> MacsecResult<()> {
        absent("rx_sc_write")
    }

    fn rx_sc_clear(&self, _port: PortNo, _rx_slot: u8) -> MacsecResult<()> {
        absent("rx_sc_clear")
    }

    // Classification

    fn rule_write(
        &self,
        _port: PortNo,
        _slot: u8,
        _direction: Direction,
        _action: MatchAction,
        _pattern: &MatchPattern,
    ) -> MacsecResult<()> {
        absent("rule_write")
    }

    fn rule_clear(
        &self,
        _port: PortNo,
        _slot: u8,
        _direction: Direction,
        _action: MatchAction,
    ) -> MacsecResult<()> {
        absent("rule_clear")
    }

    fn default_action_write(&self, _port: PortNo, _policy: &DefaultActionPolicy) -> MacsecResult<()> {
        absent("default_action_write")
    }

    fn control_frame_rule_write(
        &self,
        _port: PortNo,
        _index: u8,
        _rule: &ControlFrameMatch,
    ) -> MacsecResult<()> {
        absent("control_frame_rule_write")
    }

    fn control_frame_rule_clear(&self, _port: PortNo, _index: u8) -> MacsecResult<()> {
        absent("control_frame_rule_clear")
    }

    // Secure associations

    /// Loads key material and parameters, returning once the engine reports
    /// the key load complete.
    fn sa_install(
        &self,
        _port: PortNo,
        _sa: SaSlot,
        _record: &SaRecord,
        _key: &Sak,
    ) -> MacsecResult<()> {
        absent("sa_install")
    }

    fn sa_active_write(&self, _port: PortNo, _sa: SaSlot, _active: bool) -> MacsecResult<()> {
        absent("sa_active_write")
    }

    fn sa_pn_read(&self, _port: PortNo, _sa: SaSlot) -> MacsecResult<u64> {
        absent("sa_pn_read")
    }

    fn sa_pn_write(&self, _port: PortNo, _sa: SaSlot, _pn: u64) -> MacsecResult<()> {
        absent("sa_pn_write")
    }

    /// Invalidates the entry and overwrites its key words.
    fn sa_clear(&self, _port: PortNo, _sa: SaSlot) -> MacsecResult<()> {
        absent("sa_clear")
    }

    // Counters

    fn counters_read(&self, _port: PortNo, _group: CounterGroup) -> MacsecResult<Vec<u64>> {
        absent("counters_read")
    }

    fn counters_clear(&self, _port: PortNo, _group: CounterGroup) -> MacsecResult<()> {
        absent("counters_clear")
    }

    // Sequence events

    fn event_mask_write(&self, _port: PortNo, _mask: EventMask) -> MacsecResult<()> {
        absent("event_mask_write")
    }

    fn event_mask_read(&self, _port: PortNo) -> MacsecResult<EventMask> {
        absent("event_mask_read")
    }

    fn event_status_read(&self, _port: PortNo) -> MacsecResult<EventMask> {
        absent("event_status_read")
    }

    fn event_status_clear(&self, _port: PortNo, _mask: EventMask) -> MacsecResult<()> {
        absent("event_status_clear")
    }

    /// SecY slot and AN of the transmit SA behind the latest event.
    fn event_sa_read(&self, _port: PortNo) -> MacsecResult<Option<(u8, AssocNum)>> {
        absent("event_sa_read")
    }

    fn seq_threshold_write(&self, _port: PortNo, _threshold: u32) -> MacsecResult<()> {
        absent("seq_threshold_write")
    }

    fn seq_threshold_read(&self, _port: PortNo) -> MacsecResult<u32> {
        absent("seq_threshold_read")
    }

    // Debug

    fn capture_arm(&self, _port: PortNo, _capture: FrameCapture) -> MacsecResult<()> {
        absent("capture_arm")
    }

    fn capture_read(&self, _port: PortNo, _max_len: usize) -> MacsecResult<Option<CapturedFrame>> {
        absent("capture_read")
    }

    fn csr_read(&self, _port: PortNo, _csr: RawCsr) -> MacsecResult<u32> {
        absent("csr_read")
    }

    fn csr_write(&self, _port: PortNo, _csr: RawCsr, _value: u32) -> MacsecResult<()> {
        absent("csr_write")
    }
}
