//! Register-map driver.
//!
//! Programs the MACsec tables through a [`RegisterTransport`]. One instance
//! is created per attached port, tagged with the port's family; operations
//! the family lacks are refused with `NotImplemented` before any register is
//! touched.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, trace, warn};
use macsec_types::{AssocNum, Sak};

use super::driver::MacsecDriver;
use crate::classify::MatchPattern;
use crate::conf::{
    BypassMode, CapturedFrame, ControlFrameMatch, DefaultActionPolicy, Direction, EventMask,
    FrameCapture, InitConf, MatchAction, TagBypass, TxScConf,
};
use crate::counters::CounterGroup;
use crate::error::{MacsecError, MacsecResult};
use crate::family::{Capabilities, PhyFamily, PortInfo};
use crate::regs::{self, RegisterRecord, RxScRecord, SaRecord, SaSlot, SecyRecord};
use crate::transport::RegisterTransport;
use crate::types::{PortNo, RawCsr};

/// Bounded wait for hardware completion bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            attempts: 16,
            interval: Duration::from_micros(10),
        }
    }
}

pub struct RegisterDriver {
    family: PhyFamily,
    caps: Capabilities,
    transport: Arc<dyn RegisterTransport>,
    poll: PollConfig,
}

impl RegisterDriver {
    pub fn new(info: PortInfo, transport: Arc<dyn RegisterTransport>, poll: PollConfig) -> Self {
        RegisterDriver {
            family: info.family,
            caps: info.capabilities(),
            transport,
            poll,
        }
    }

    fn read(&self, port: PortNo, csr: impl Into<RawCsr>) -> MacsecResult<u32> {
        let csr = csr.into();
        let value = self
            .transport
            .read(port, csr)
            .map_err(MacsecError::from_status)?;
        trace!("port {} rd {} = 0x{:08x}", port, csr, value);
        Ok(value)
    }

    fn write(&self, port: PortNo, csr: impl Into<RawCsr>, value: u32) -> MacsecResult<()> {
        let csr = csr.into();
        trace!("port {} wr {} = 0x{:08x}", port, csr, value);
        self.transport
            .write(port, csr, value)
            .map_err(MacsecError::from_status)
    }

    /// Writes a record with its control word last.
    fn write_record<R: RegisterRecord>(
        &self,
        port: PortNo,
        base: RawCsr,
        record: &R,
    ) -> MacsecResult<()> {
        let words = record.to_words();
        for (i, value) in words.iter().enumerate().skip(1) {
            self.write(port, base.offset(i as u32), *value)?;
        }
        match words.first() {
            Some(ctrl) => self.write(port, base, *ctrl),
            None => Ok(()),
        }
    }

    fn read_record<R: RegisterRecord>(&self, port: PortNo, base: RawCsr) -> MacsecResult<R> {
        let words = (0..R::WORDS)
            .map(|i| self.read(port, base.offset(i)))
            .collect::<MacsecResult<Vec<u32>>>()?;
        Ok(R::from_words(&words))
    }

    fn modify(&self, port: PortNo, csr: RawCsr, set: u32, clear: u32) -> MacsecResult<()> {
        let value = self.read(port, csr)?;
        self.write(port, csr, (value & !clear) | set)
    }

    fn require_macsec(&self, op: &str) -> MacsecResult<()> {
        if self.caps.macsec {
            Ok(())
        } else {
            Err(MacsecError::not_implemented(format!(
                "{} on {} (no MACsec engine)",
                op, self.family
            )))
        }
    }

    fn require_xpn(&self, op: &str) -> MacsecResult<()> {
        if self.caps.xpn {
            Ok(())
        } else {
            Err(MacsecError::not_implemented(format!(
                "{} on {} (no XPN support)",
                op, self.family
            )))
        }
    }

    fn require_capture(&self) -> MacsecResult<()> {
        if self.caps.frame_capture {
            Ok(())
        } else {
            Err(MacsecError::not_implemented(format!(
                "frame capture on {}",
                self.family
            )))
        }
    }

    fn check_slot(&self, what: &str, slot: u8, max: u8) -> MacsecResult<()> {
        if slot < max {
            Ok(())
        } else {
            Err(MacsecError::invalid_argument(format!(
                "{} slot {} out of range (max {})",
                what, slot, max
            )))
        }
    }

    fn wipe_sa(&self, port: PortNo, sa: SaSlot) -> MacsecResult<()> {
        let base = sa.base();
        self.write(port, base, 0)?;
        for i in 0..regs::SA_KEY_WORDS {
            self.write(port, base.offset(regs::SA_KEY_WORD + i), 0)?;
        }
        Ok(())
    }

    fn wait_key_loaded(&self, port: PortNo, sa: SaSlot) -> MacsecResult<()> {
        let attempts = self.poll.attempts.max(1);
        for attempt in 0..attempts {
            let ctrl = self.read(port, sa.base())?;
            if ctrl & regs::SA_BUSY == 0 {
                debug!("port {} {:?} key loaded after {} polls", port, sa, attempt + 1);
                return Ok(());
            }
            thread::sleep(self.poll.interval);
        }
        Err(MacsecError::timeout("SA key load", attempts))
    }
}

impl MacsecDriver for RegisterDriver {
    fn family(&self) -> PhyFamily {
        self.family
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn init_set(&self, port: PortNo, conf: &InitConf) -> MacsecResult<()> {
        self.require_macsec("init_set")?;
        let mut conf = *conf;
        if conf.bypass == BypassMode::None {
            let current: InitConf = self.read_record(port, regs::GLOBAL_CTRL.raw())?;
            conf.bypass = current.bypass;
        }
        self.write_record(port, regs::GLOBAL_CTRL.raw(), &conf)
    }

    fn init_get(&self, port: PortNo) -> MacsecResult<InitConf> {
        self.require_macsec("init_get")?;
        self.read_record(port, regs::GLOBAL_CTRL.raw())
    }

    fn mtu_write(&self, port: PortNo, mtu: u16) -> MacsecResult<()> {
        self.require_macsec("mtu_write")?;
        self.write(port, regs::MTU, u32::from(mtu))
    }

    fn mtu_read(&self, port: PortNo) -> MacsecResult<u16> {
        self.require_macsec("mtu_read")?;
        Ok((self.read(port, regs::MTU)? & 0xffff) as u16)
    }

    fn secy_write(&self, port: PortNo, slot: u8, record: &SecyRecord) -> MacsecResult<()> {
        self.require_macsec("secy_write")?;
        self.check_slot("SecY", slot, self.caps.max_secy)?;
        if record.conf.cipher_suite.is_xpn() {
            self.require_xpn("XPN cipher suite")?;
        }
        self.write_record(port, regs::secy_base(slot).raw(), record)
    }

    fn secy_clear(&self, port: PortNo, slot: u8) -> MacsecResult<()> {
        self.check_slot("SecY", slot, self.caps.max_secy)?;
        let base = regs::secy_base(slot);
        self.write(port, base.add(regs::SECY_TAG_BYPASS_WORD), 0)?;
        self.write(port, base.add(regs::SECY_ENCODING_SA_WORD), 0)?;
        self.write(port, base.add(regs::SECY_TXSC_WORD), 0)?;
        self.write(port, base, 0)
    }

    fn controlled_port_write(&self, port: PortNo, slot: u8, enable: bool) -> MacsecResult<()> {
        self.check_slot("SecY", slot, self.caps.max_secy)?;
        let csr = regs::secy_base(slot).raw();
        if enable {
            self.modify(port, csr, regs::SECY_CONTROLLED, 0)
        } else {
            self.modify(port, csr, 0, regs::SECY_CONTROLLED)
        }
    }

    fn tx_sc_write(&self, port: PortNo, slot: u8, conf: &TxScConf) -> MacsecResult<()> {
        self.check_slot("SecY", slot, self.caps.max_secy)?;
        self.write_record(port, regs::secy_base(slot).add(regs::SECY_TXSC_WORD).raw(), conf)
    }

    fn tx_sc_clear(&self, port: PortNo, slot: u8) -> MacsecResult<()> {
        self.check_slot("SecY", slot, self.caps.max_secy)?;
        let base = regs::secy_base(slot);
        self.write(port, base.add(regs::SECY_ENCODING_SA_WORD), 0)?;
        self.write(port, base.add(regs::SECY_TXSC_WORD), 0)
    }

    fn encoding_sa_write(&self, port: PortNo, slot: u8, an: Option<AssocNum>) -> MacsecResult<()> {
        self.check_slot("SecY", slot, self.caps.max_secy)?;
        self.write(
            port,
            regs::secy_base(slot).add(regs::SECY_ENCODING_SA_WORD),
            regs::encode_encoding_sa(an),
        )
    }

    fn tag_bypass_write(&self, port: PortNo, slot: u8, bypass: TagBypass) -> MacsecResult<()> {
        self.require_macsec("tag_bypass_write")?;
        self.check_slot("SecY", slot, self.caps.max_secy)?;
        self.write(
            port,
            regs::secy_base(slot).add(regs::SECY_TAG_BYPASS_WORD),
            bypass.to_raw(),
        )
    }

    fn tag_bypass_read(&self, port: PortNo, slot: u8) -> MacsecResult<TagBypass> {
        self.require_macsec("tag_bypass_read")?;
        self.check_slot("SecY", slot, self.caps.max_secy)?;
        let raw = self.read(port, regs::secy_base(slot).add(regs::SECY_TAG_BYPASS_WORD))?;
        Ok(TagBypass::from_raw(raw))
    }

    fn rx_sc_write(&self, port: PortNo, rx_slot: u8, record: &RxScRecord) -> MacsecResult<()> {
        self.check_slot("Rx SC", rx_slot, self.caps.max_rx_sc)?;
        self.write_record(port, regs::rx_sc_base(rx_slot).raw(), record)
    }

    fn rx_sc_clear(&self, port: PortNo, rx_slot: u8) -> MacsecResult<()> {
        self.check_slot("Rx SC", rx_slot, self.caps.max_rx_sc)?;
        self.write(port, regs::rx_sc_base(rx_slot), 0)
    }

    fn rule_write(
        &self,
        port: PortNo,
        slot: u8,
        direction: Direction,
        action: MatchAction,
        pattern: &MatchPattern,
    ) -> MacsecResult<()> {
        self.check_slot("SecY", slot, self.caps.max_secy)?;
        // The entry is rewritten in place with VALID kept set, so the slot
        // never reads as empty while being replaced.
        self.write_record(port, regs::rule_base(slot, direction, action).raw(), pattern)
    }

    fn rule_clear(
        &self,
        port: PortNo,
        slot: u8,
        direction: Direction,
        action: MatchAction,
    ) -> MacsecResult<()> {
        self.check_slot("SecY", slot, self.caps.max_secy)?;
        self.write(port, regs::rule_base(slot, direction, action), 0)
    }

    fn default_action_write(&self, port: PortNo, policy: &DefaultActionPolicy) -> MacsecResult<()> {
        self.require_macsec("default_action_write")?;
        self.write(port, regs::DEFAULT_ACTION, policy.to_raw())
    }

    fn control_frame_rule_write(
        &self,
        port: PortNo,
        index: u8,
        rule: &ControlFrameMatch,
    ) -> MacsecResult<()> {
        self.require_macsec("control_frame_rule_write")?;
        self.check_slot("control frame rule", index, self.caps.control_frame_rules)?;
        self.write_record(port, regs::ctrl_rule_base(index).raw(), rule)
    }

    fn control_frame_rule_clear(&self, port: PortNo, index: u8) -> MacsecResult<()> {
        self.require_macsec("control_frame_rule_clear")?;
        self.check_slot("control frame rule", index, self.caps.control_frame_rules)?;
        self.write(port, regs::ctrl_rule_base(index), 0)
    }

    fn sa_install(
        &self,
        port: PortNo,
        sa: SaSlot,
        record: &SaRecord,
        key: &Sak,
    ) -> MacsecResult<()> {
        self.require_macsec("sa_install")?;
        if record.xpn {
            self.require_xpn("XPN secure association")?;
        }
        let base = sa.base();
        let result = (|| {
            let key_words = regs::key_words(key);
            for (i, value) in key_words.iter().enumerate() {
                self.write(port, base.offset(regs::SA_KEY_WORD + i as u32), *value)?;
            }
            drop(key_words);
            let words = record.to_words();
            for (i, value) in words.iter().enumerate().skip(1) {
                self.write(port, base.offset(i as u32), *value)?;
            }
            self.write(port, base, record.ctrl() | regs::SA_INSTALL)?;
            self.wait_key_loaded(port, sa)
        })();

        if let Err(err) = &result {
            warn!("port {} {:?} install failed: {}; wiping key words", port, sa, err);
            if let Err(wipe_err) = self.wipe_sa(port, sa) {
                warn!("port {} {:?} key wipe failed: {}", port, sa, wipe_err);
            }
        }
        result
    }

    fn sa_active_write(&self, port: PortNo, sa: SaSlot, active: bool) -> MacsecResult<()> {
        let clear = regs::SA_INSTALL | regs::SA_BUSY;
        if active {
            self.modify(port, sa.base(), regs::SA_ACTIVE, clear)
        } else {
            self.modify(port, sa.base(), 0, clear | regs::SA_ACTIVE)
        }
    }

    fn sa_pn_read(&self, port: PortNo, sa: SaSlot) -> MacsecResult<u64> {
        let base = sa.base();
        let lo = self.read(port, base.offset(1))?;
        let hi = self.read(port, base.offset(2))?;
        Ok((u64::from(hi) << 32) | u64::from(lo))
    }

    fn sa_pn_write(&self, port: PortNo, sa: SaSlot, pn: u64) -> MacsecResult<()> {
        let base = sa.base();
        self.write(port, base.offset(2), (pn >> 32) as u32)?;
        self.write(port, base.offset(1), pn as u32)
    }

    fn sa_clear(&self, port: PortNo, sa: SaSlot) -> MacsecResult<()> {
        self.wipe_sa(port, sa)
    }

    fn counters_read(&self, port: PortNo, group: CounterGroup) -> MacsecResult<Vec<u64>> {
        self.require_macsec("counters_read")?;
        (0..group.field_count())
            .map(|field| {
                let (lo, hi) = regs::counter_csrs(group, field);
                let lo = self.read(port, lo)?;
                let hi = self.read(port, hi)?;
                Ok((u64::from(hi) << 32) | u64::from(lo))
            })
            .collect()
    }

    fn counters_clear(&self, port: PortNo, group: CounterGroup) -> MacsecResult<()> {
        self.require_macsec("counters_clear")?;
        for field in 0..group.field_count() {
            let (lo, hi) = regs::counter_csrs(group, field);
            self.write(port, lo, 0)?;
            self.write(port, hi, 0)?;
        }
        Ok(())
    }

    fn event_mask_write(&self, port: PortNo, mask: EventMask) -> MacsecResult<()> {
        self.require_macsec("event_mask_write")?;
        if mask.contains(EventMask::SEQ_THRESHOLD) {
            self.require_xpn("sequence threshold event")?;
        }
        self.write(port, regs::EVENT_MASK, mask.bits())
    }

    fn event_mask_read(&self, port: PortNo) -> MacsecResult<EventMask> {
        self.require_macsec("event_mask_read")?;
        Ok(EventMask::from_bits_truncate(self.read(port, regs::EVENT_MASK)?))
    }

    fn event_status_read(&self, port: PortNo) -> MacsecResult<EventMask> {
        self.require_macsec("event_status_read")?;
        Ok(EventMask::from_bits_truncate(self.read(port, regs::EVENT_STATUS)?))
    }

    fn event_status_clear(&self, port: PortNo, mask: EventMask) -> MacsecResult<()> {
        self.require_macsec("event_status_clear")?;
        self.write(port, regs::EVENT_STATUS, mask.bits())
    }

    fn event_sa_read(&self, port: PortNo) -> MacsecResult<Option<(u8, AssocNum)>> {
        self.require_macsec("event_sa_read")?;
        Ok(regs::decode_event_sa(self.read(port, regs::EVENT_SA)?))
    }

    fn seq_threshold_write(&self, port: PortNo, threshold: u32) -> MacsecResult<()> {
        self.require_xpn("sequence threshold")?;
        self.write(port, regs::SEQ_THRESHOLD, threshold)
    }

    fn seq_threshold_read(&self, port: PortNo) -> MacsecResult<u32> {
        self.require_xpn("sequence threshold")?;
        self.read(port, regs::SEQ_THRESHOLD)
    }

    fn capture_arm(&self, port: PortNo, capture: FrameCapture) -> MacsecResult<()> {
        self.require_capture()?;
        self.write(port, regs::CAPTURE_CTRL, capture.to_raw())
    }

    fn capture_read(&self, port: PortNo, max_len: usize) -> MacsecResult<Option<CapturedFrame>> {
        self.require_capture()?;
        let ctrl = self.read(port, regs::CAPTURE_CTRL)?;
        if ctrl & regs::CAPTURE_READY == 0 {
            return Ok(None);
        }
        let length = self.read(port, regs::CAPTURE_LEN)? as usize;
        let take = length
            .min(max_len)
            .min(regs::CAPTURE_WORDS as usize * 4);
        let mut bytes = Vec::with_capacity(take);
        for i in 0..take.div_ceil(4) {
            let value = self.read(port, regs::CAPTURE_DATA.add(i as u32))?;
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        bytes.truncate(take);
        self.write(port, regs::CAPTURE_CTRL, 0)?;
        Ok(Some(CapturedFrame { length, bytes }))
    }

    fn csr_read(&self, port: PortNo, csr: RawCsr) -> MacsecResult<u32> {
        self.read(port, csr)
    }

    fn csr_write(&self, port: PortNo, csr: RawCsr, value: u32) -> MacsecResult<()> {
        self.write(port, csr, value)
    }
}
