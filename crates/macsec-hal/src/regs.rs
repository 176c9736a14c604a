//! MACsec register map.
//!
//! Every table entry is described by a record type whose `to_words` output
//! is laid out at consecutive addresses starting at the entry base. Word 0 is
//! always the control word holding the VALID bit; writers program it last.

use crate::classify::{MatchPattern, MatchPriority, TagMatch};
use crate::conf::{
    BypassMode, ControlFrameMatch, Direction, InitConf, MacBlock, MatchAction, RxScConf,
    SecyConf, TxScConf, ValidateFrames,
};
use crate::counters::CounterGroup;
use crate::types::{
    CounterBlock, Csr, GlobalBlock, RawCsr, RuleBlock, RxSaBlock, RxScBlock, SecyBlock, TxSaBlock,
};
use macsec_types::{wipe, AssocNum, CipherSuite, EtherType, MacAddress, Sak, Sci, VlanId};
use std::ops::Deref;

// Global block.
pub const GLOBAL_CTRL: Csr<GlobalBlock> = Csr::new(0x00);
pub const DEFAULT_ACTION: Csr<GlobalBlock> = Csr::new(0x01);
pub const MTU: Csr<GlobalBlock> = Csr::new(0x02);
pub const EVENT_MASK: Csr<GlobalBlock> = Csr::new(0x03);
/// Sticky event status, write-one-to-clear.
pub const EVENT_STATUS: Csr<GlobalBlock> = Csr::new(0x04);
pub const EVENT_SA: Csr<GlobalBlock> = Csr::new(0x05);
pub const SEQ_THRESHOLD: Csr<GlobalBlock> = Csr::new(0x06);
pub const CAPTURE_CTRL: Csr<GlobalBlock> = Csr::new(0x07);
pub const CAPTURE_LEN: Csr<GlobalBlock> = Csr::new(0x08);
pub const CAPTURE_DATA: Csr<GlobalBlock> = Csr::new(0x10);
pub const CAPTURE_WORDS: u32 = 32;
pub const CTRL_RULE_BASE: Csr<GlobalBlock> = Csr::new(0x40);
pub const CTRL_RULE_STRIDE: u32 = 4;

pub const CTRL_ENABLE: u32 = 1 << 0;
pub const CTRL_BYPASS_SHIFT: u32 = 1;
pub const CTRL_ING_DROP_NM: u32 = 1 << 3;
pub const CTRL_LMAC_DIS_LEN: u32 = 1 << 4;
pub const CTRL_HMAC_DIS_LEN: u32 = 1 << 5;

pub const CAPTURE_READY: u32 = 1 << 4;
pub const EVENT_SA_VALID: u32 = 1 << 31;

// Per-entry control bits.
pub const VALID: u32 = 1 << 0;

pub const SECY_CONTROLLED: u32 = 1 << 1;
pub const SECY_REPLAY: u32 = 1 << 2;
pub const SECY_VALIDATE_SHIFT: u32 = 3;
pub const SECY_CIPHER_SHIFT: u32 = 5;
pub const SECY_PROTECT: u32 = 1 << 7;
pub const SECY_INCLUDE_SCI: u32 = 1 << 8;
pub const SECY_USE_ES: u32 = 1 << 9;
pub const SECY_USE_SCB: u32 = 1 << 10;
pub const CONF_OFFSET_SHIFT: u32 = 16;

pub const TXSC_PROTECT: u32 = 1 << 1;
pub const TXSC_INCLUDE_SCI: u32 = 1 << 2;
pub const TXSC_USE_ES: u32 = 1 << 3;
pub const TXSC_USE_SCB: u32 = 1 << 4;

pub const RULE_PRIO_HIGH: u32 = 1 << 1;
pub const RULE_M_ETYPE: u32 = 1 << 2;
pub const RULE_M_SRC: u32 = 1 << 3;
pub const RULE_M_DST: u32 = 1 << 4;
pub const RULE_M_CTRL: u32 = 1 << 5;
pub const RULE_CTRL_VALUE: u32 = 1 << 6;
pub const RULE_VLAN_SHIFT: u32 = 8;
pub const RULE_INNER_VLAN_SHIFT: u32 = 10;

pub const CTRL_RULE_M_ETYPE: u32 = 1 << 1;
pub const CTRL_RULE_M_MAC: u32 = 1 << 2;

pub const SA_ACTIVE: u32 = 1 << 1;
pub const SA_CONFIDENTIAL: u32 = 1 << 2;
pub const SA_XPN: u32 = 1 << 3;
/// Write 1 to load the key words into the engine.
pub const SA_INSTALL: u32 = 1 << 4;
/// Set by hardware while a key load is in progress.
pub const SA_BUSY: u32 = 1 << 5;
pub const SA_REPLAY: u32 = 1 << 6;

pub const RXSC_SECY_SHIFT: u32 = 8;

// Table geometry.
pub const SECY_STRIDE: u32 = 0x10;
pub const SECY_TXSC_WORD: u32 = 5;
pub const SECY_ENCODING_SA_WORD: u32 = 6;
pub const SECY_TAG_BYPASS_WORD: u32 = 7;
pub const RULE_STRIDE: u32 = 0x8;
pub const RXSC_STRIDE: u32 = 0x8;
pub const SA_STRIDE: u32 = 0x20;
pub const SA_KEY_WORD: u32 = 8;
pub const SA_KEY_WORDS: u32 = 15;

/// A table entry laid out at consecutive register addresses.
pub trait RegisterRecord: Sized {
    const WORDS: u32;

    fn to_words(&self) -> Vec<u32>;

    fn from_words(words: &[u32]) -> Self;
}

fn word(words: &[u32], index: usize) -> u32 {
    words.get(index).copied().unwrap_or(0)
}

fn flag(value: u32, mask: u32) -> bool {
    value & mask != 0
}

fn set(cond: bool, mask: u32) -> u32 {
    if cond {
        mask
    } else {
        0
    }
}

fn mac_words(mac: MacAddress) -> [u32; 2] {
    let raw = mac.to_u64();
    [raw as u32, (raw >> 32) as u32]
}

fn mac_from_words(lo: u32, hi: u32) -> MacAddress {
    MacAddress::from_u64((u64::from(hi) << 32) | u64::from(lo))
}

fn conf_offset(ctrl: u32) -> u8 {
    ((ctrl >> CONF_OFFSET_SHIFT) & 0xff) as u8
}

impl RegisterRecord for InitConf {
    const WORDS: u32 = 1;

    fn to_words(&self) -> Vec<u32> {
        vec![
            set(self.enable, CTRL_ENABLE)
                | (self.bypass.to_raw() << CTRL_BYPASS_SHIFT)
                | set(self.ingress_drop_non_macsec, CTRL_ING_DROP_NM)
                | set(self.lmac_disable_length_validate, CTRL_LMAC_DIS_LEN)
                | set(self.hmac_disable_length_validate, CTRL_HMAC_DIS_LEN),
        ]
    }

    fn from_words(words: &[u32]) -> Self {
        let ctrl = word(words, 0);
        InitConf {
            enable: flag(ctrl, CTRL_ENABLE),
            bypass: BypassMode::from_raw(ctrl >> CTRL_BYPASS_SHIFT),
            ingress_drop_non_macsec: flag(ctrl, CTRL_ING_DROP_NM),
            lmac_disable_length_validate: flag(ctrl, CTRL_LMAC_DIS_LEN),
            hmac_disable_length_validate: flag(ctrl, CTRL_HMAC_DIS_LEN),
        }
    }
}

/// SecY table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecyRecord {
    pub conf: SecyConf,
    pub port_id: u16,
    pub controlled: bool,
}

impl RegisterRecord for SecyRecord {
    const WORDS: u32 = 5;

    fn to_words(&self) -> Vec<u32> {
        let conf = &self.conf;
        let ctrl = VALID
            | set(self.controlled, SECY_CONTROLLED)
            | set(conf.replay_protect, SECY_REPLAY)
            | (conf.validate_frames.to_raw() << SECY_VALIDATE_SHIFT)
            | (conf.cipher_suite.to_raw() << SECY_CIPHER_SHIFT)
            | set(conf.protect_frames, SECY_PROTECT)
            | set(conf.always_include_sci, SECY_INCLUDE_SCI)
            | set(conf.use_es, SECY_USE_ES)
            | set(conf.use_scb, SECY_USE_SCB)
            | (u32::from(conf.confidentiality_offset) << CONF_OFFSET_SHIFT);
        let [mac_lo, mac_hi] = mac_words(conf.mac_addr);
        vec![
            ctrl,
            conf.replay_window,
            mac_lo,
            mac_hi,
            u32::from(self.port_id),
        ]
    }

    fn from_words(words: &[u32]) -> Self {
        let ctrl = word(words, 0);
        SecyRecord {
            conf: SecyConf {
                mac_addr: mac_from_words(word(words, 2), word(words, 3)),
                validate_frames: ValidateFrames::from_raw(ctrl >> SECY_VALIDATE_SHIFT),
                replay_protect: flag(ctrl, SECY_REPLAY),
                replay_window: word(words, 1),
                protect_frames: flag(ctrl, SECY_PROTECT),
                always_include_sci: flag(ctrl, SECY_INCLUDE_SCI),
                use_es: flag(ctrl, SECY_USE_ES),
                use_scb: flag(ctrl, SECY_USE_SCB),
                cipher_suite: CipherSuite::from_raw(ctrl >> SECY_CIPHER_SHIFT),
                confidentiality_offset: conf_offset(ctrl),
            },
            port_id: (word(words, 4) & 0xffff) as u16,
            controlled: flag(ctrl, SECY_CONTROLLED),
        }
    }
}

impl RegisterRecord for TxScConf {
    const WORDS: u32 = 1;

    fn to_words(&self) -> Vec<u32> {
        vec![
            VALID
                | set(self.protect_frames, TXSC_PROTECT)
                | set(self.always_include_sci, TXSC_INCLUDE_SCI)
                | set(self.use_es, TXSC_USE_ES)
                | set(self.use_scb, TXSC_USE_SCB)
                | (u32::from(self.confidentiality_offset) << CONF_OFFSET_SHIFT),
        ]
    }

    fn from_words(words: &[u32]) -> Self {
        let ctrl = word(words, 0);
        TxScConf {
            protect_frames: flag(ctrl, TXSC_PROTECT),
            always_include_sci: flag(ctrl, TXSC_INCLUDE_SCI),
            use_es: flag(ctrl, TXSC_USE_ES),
            use_scb: flag(ctrl, TXSC_USE_SCB),
            confidentiality_offset: conf_offset(ctrl),
        }
    }
}

/// Receive SC table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxScRecord {
    pub secy_slot: u8,
    pub sci: Sci,
    pub conf: RxScConf,
}

impl RegisterRecord for RxScRecord {
    const WORDS: u32 = 4;

    fn to_words(&self) -> Vec<u32> {
        let ctrl = VALID
            | set(self.conf.replay_protect, SECY_REPLAY)
            | (self.conf.validate_frames.to_raw() << SECY_VALIDATE_SHIFT)
            | (u32::from(self.secy_slot) << RXSC_SECY_SHIFT)
            | (u32::from(self.conf.confidentiality_offset) << CONF_OFFSET_SHIFT);
        let sci = self.sci.to_u64();
        vec![ctrl, sci as u32, (sci >> 32) as u32, self.conf.replay_window]
    }

    fn from_words(words: &[u32]) -> Self {
        let ctrl = word(words, 0);
        RxScRecord {
            secy_slot: ((ctrl >> RXSC_SECY_SHIFT) & 0xff) as u8,
            sci: Sci::from_u64((u64::from(word(words, 2)) << 32) | u64::from(word(words, 1))),
            conf: RxScConf {
                validate_frames: ValidateFrames::from_raw(ctrl >> SECY_VALIDATE_SHIFT),
                replay_protect: flag(ctrl, SECY_REPLAY),
                replay_window: word(words, 3),
                confidentiality_offset: conf_offset(ctrl),
            },
        }
    }
}

fn tag_kind(tag: Option<TagMatch>) -> (u32, u16) {
    match tag {
        None => (0, 0),
        Some(TagMatch::Absent) => (1, 0),
        Some(TagMatch::Present) => (2, 0),
        Some(TagMatch::Vid(vid)) => (3, vid.as_u16()),
    }
}

fn tag_from_kind(kind: u32, vid: u16) -> Option<TagMatch> {
    match kind & 0x3 {
        1 => Some(TagMatch::Absent),
        2 => Some(TagMatch::Present),
        3 => VlanId::new(vid).ok().map(TagMatch::Vid),
        _ => None,
    }
}

impl RegisterRecord for MatchPattern {
    const WORDS: u32 = 7;

    fn to_words(&self) -> Vec<u32> {
        let (vlan_kind, vid) = tag_kind(self.vlan);
        let (inner_kind, inner_vid) = tag_kind(self.inner_vlan);
        let ctrl = VALID
            | set(self.priority == MatchPriority::High, RULE_PRIO_HIGH)
            | set(self.ethertype.is_some(), RULE_M_ETYPE)
            | set(self.src_mac.is_some(), RULE_M_SRC)
            | set(self.dest_mac.is_some(), RULE_M_DST)
            | set(self.is_control.is_some(), RULE_M_CTRL)
            | set(self.is_control == Some(true), RULE_CTRL_VALUE)
            | (vlan_kind << RULE_VLAN_SHIFT)
            | (inner_kind << RULE_INNER_VLAN_SHIFT);
        let [src_lo, src_hi] = mac_words(self.src_mac.unwrap_or_default());
        let [dst_lo, dst_hi] = mac_words(self.dest_mac.unwrap_or_default());
        vec![
            ctrl,
            u32::from(self.ethertype.map_or(0, |etype| etype.as_u16())),
            u32::from(vid) | (u32::from(inner_vid) << 16),
            src_lo,
            src_hi,
            dst_lo,
            dst_hi,
        ]
    }

    fn from_words(words: &[u32]) -> Self {
        let ctrl = word(words, 0);
        let vids = word(words, 2);
        MatchPattern {
            priority: if flag(ctrl, RULE_PRIO_HIGH) {
                MatchPriority::High
            } else {
                MatchPriority::Low
            },
            ethertype: flag(ctrl, RULE_M_ETYPE)
                .then(|| EtherType::new((word(words, 1) & 0xffff) as u16)),
            vlan: tag_from_kind(ctrl >> RULE_VLAN_SHIFT, (vids & 0xffff) as u16),
            inner_vlan: tag_from_kind(ctrl >> RULE_INNER_VLAN_SHIFT, (vids >> 16) as u16),
            src_mac: flag(ctrl, RULE_M_SRC).then(|| mac_from_words(word(words, 3), word(words, 4))),
            dest_mac: flag(ctrl, RULE_M_DST)
                .then(|| mac_from_words(word(words, 5), word(words, 6))),
            is_control: flag(ctrl, RULE_M_CTRL).then(|| flag(ctrl, RULE_CTRL_VALUE)),
        }
    }
}

impl RegisterRecord for ControlFrameMatch {
    const WORDS: u32 = 4;

    fn to_words(&self) -> Vec<u32> {
        let ctrl = VALID
            | set(self.ethertype.is_some(), CTRL_RULE_M_ETYPE)
            | set(self.dest_mac.is_some(), CTRL_RULE_M_MAC);
        let [mac_lo, mac_hi] = mac_words(self.dest_mac.unwrap_or_default());
        vec![
            ctrl,
            u32::from(self.ethertype.map_or(0, |etype| etype.as_u16())),
            mac_lo,
            mac_hi,
        ]
    }

    fn from_words(words: &[u32]) -> Self {
        let ctrl = word(words, 0);
        ControlFrameMatch {
            ethertype: flag(ctrl, CTRL_RULE_M_ETYPE)
                .then(|| EtherType::new((word(words, 1) & 0xffff) as u16)),
            dest_mac: flag(ctrl, CTRL_RULE_M_MAC)
                .then(|| mac_from_words(word(words, 2), word(words, 3))),
        }
    }
}

/// SA table entry, key words excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaRecord {
    pub active: bool,
    pub confidential: bool,
    pub xpn: bool,
    pub replay_protect: bool,
    pub replay_window: u32,
    /// `next_pn` for transmit entries, `lowest_pn` for receive entries.
    pub pn: u64,
    pub ssci: u32,
}

impl SaRecord {
    pub fn ctrl(&self) -> u32 {
        VALID
            | set(self.active, SA_ACTIVE)
            | set(self.confidential, SA_CONFIDENTIAL)
            | set(self.xpn, SA_XPN)
            | set(self.replay_protect, SA_REPLAY)
    }
}

impl RegisterRecord for SaRecord {
    const WORDS: u32 = 5;

    fn to_words(&self) -> Vec<u32> {
        vec![
            self.ctrl(),
            self.pn as u32,
            (self.pn >> 32) as u32,
            self.ssci,
            self.replay_window,
        ]
    }

    fn from_words(words: &[u32]) -> Self {
        let ctrl = word(words, 0);
        SaRecord {
            active: flag(ctrl, SA_ACTIVE),
            confidential: flag(ctrl, SA_CONFIDENTIAL),
            xpn: flag(ctrl, SA_XPN),
            replay_protect: flag(ctrl, SA_REPLAY),
            replay_window: word(words, 4),
            pn: (u64::from(word(words, 2)) << 32) | u64::from(word(words, 1)),
            ssci: word(words, 3),
        }
    }
}

/// Key, hash subkey and salt as written from `SA_KEY_WORD` onwards.
/// Zeroed on drop.
pub struct KeyWords([u32; SA_KEY_WORDS as usize]);

impl KeyWords {
    pub fn clear(&mut self) {
        wipe(&mut self.0);
    }
}

impl Deref for KeyWords {
    type Target = [u32];

    fn deref(&self) -> &[u32] {
        &self.0
    }
}

impl Drop for KeyWords {
    fn drop(&mut self) {
        self.clear();
    }
}

pub fn key_words(sak: &Sak) -> KeyWords {
    let mut words = KeyWords([0u32; SA_KEY_WORDS as usize]);
    let mut bytes = [0u8; 60];
    bytes[..sak.key_len()].copy_from_slice(sak.key());
    bytes[32..48].copy_from_slice(sak.h_key());
    if let Some(salt) = sak.salt() {
        bytes[48..60].copy_from_slice(salt);
    }
    for (w, chunk) in words.0.iter_mut().zip(bytes.chunks(4)) {
        *w = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    wipe(&mut bytes);
    words
}

/// Secure association location in hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaSlot {
    Tx { secy_slot: u8, an: AssocNum },
    Rx { rx_slot: u8, an: AssocNum },
}

impl SaSlot {
    pub fn base(&self) -> RawCsr {
        match self {
            SaSlot::Tx { secy_slot, an } => {
                Csr::<TxSaBlock>::new(sa_index(*secy_slot, *an) * SA_STRIDE).raw()
            }
            SaSlot::Rx { rx_slot, an } => {
                Csr::<RxSaBlock>::new(sa_index(*rx_slot, *an) * SA_STRIDE).raw()
            }
        }
    }

    pub fn an(&self) -> AssocNum {
        match self {
            SaSlot::Tx { an, .. } | SaSlot::Rx { an, .. } => *an,
        }
    }

    pub fn counters(&self) -> CounterGroup {
        match *self {
            SaSlot::Tx { secy_slot, an } => CounterGroup::TxSa {
                slot: secy_slot,
                an,
            },
            SaSlot::Rx { rx_slot, an } => CounterGroup::RxSa { rx_slot, an },
        }
    }
}

fn sa_index(slot: u8, an: AssocNum) -> u32 {
    u32::from(slot) * 4 + u32::from(an.as_u8())
}

pub fn secy_base(slot: u8) -> Csr<SecyBlock> {
    Csr::new(u32::from(slot) * SECY_STRIDE)
}

pub fn rx_sc_base(rx_slot: u8) -> Csr<RxScBlock> {
    Csr::new(u32::from(rx_slot) * RXSC_STRIDE)
}

pub fn rule_base(slot: u8, direction: Direction, action: MatchAction) -> Csr<RuleBlock> {
    let index = (u32::from(slot) * 2 + direction.index()) * 3 + action.index();
    Csr::new(index * RULE_STRIDE)
}

pub fn ctrl_rule_base(index: u8) -> Csr<GlobalBlock> {
    CTRL_RULE_BASE.add(u32::from(index) * CTRL_RULE_STRIDE)
}

pub fn encode_event_sa(secy_slot: u8, an: AssocNum) -> u32 {
    EVENT_SA_VALID | (u32::from(secy_slot) << 8) | u32::from(an.as_u8())
}

pub fn decode_event_sa(raw: u32) -> Option<(u8, AssocNum)> {
    if !flag(raw, EVENT_SA_VALID) {
        return None;
    }
    let an = AssocNum::new((raw & 0x3) as u8).ok()?;
    Some((((raw >> 8) & 0xff) as u8, an))
}

pub fn encode_encoding_sa(an: Option<AssocNum>) -> u32 {
    an.map_or(0, |an| EVENT_SA_VALID | u32::from(an.as_u8()))
}

pub fn decode_encoding_sa(raw: u32) -> Option<AssocNum> {
    if flag(raw, EVENT_SA_VALID) {
        AssocNum::new((raw & 0x3) as u8).ok()
    } else {
        None
    }
}

/// First register of a counter group. Field `i` lives at `2i` (low word)
/// and `2i + 1` (high word).
pub fn counter_base(group: CounterGroup) -> Csr<CounterBlock> {
    let offset = match group {
        CounterGroup::Secy { slot } => u32::from(slot) * 0x40,
        CounterGroup::TxSc { slot } => 0x1000 + u32::from(slot) * 0x10,
        CounterGroup::TxSa { slot, an } => 0x2000 + sa_index(slot, an) * 0x10,
        CounterGroup::RxSc { rx_slot } => 0x3000 + u32::from(rx_slot) * 0x20,
        CounterGroup::RxSa { rx_slot, an } => 0x4000 + sa_index(rx_slot, an) * 0x10,
        CounterGroup::Mac(MacBlock::Host) => 0x5000,
        CounterGroup::Mac(MacBlock::Line) => 0x5040,
        CounterGroup::Uncontrolled => 0x5080,
        CounterGroup::Common => 0x50c0,
        CounterGroup::Controlled { slot } => 0x6000 + u32::from(slot) * 0x20,
    };
    Csr::new(offset)
}

pub fn counter_csrs(group: CounterGroup, field: usize) -> (RawCsr, RawCsr) {
    let lo = counter_base(group).add(2 * field as u32);
    (lo.raw(), lo.add(1).raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_secy_record_words() {
        let record = SecyRecord {
            conf: SecyConf {
                mac_addr: "00:01:c1:00:00:2a".parse().unwrap(),
                replay_protect: true,
                replay_window: 64,
                cipher_suite: CipherSuite::GcmAesXpn256,
                confidentiality_offset: 30,
                ..Default::default()
            },
            port_id: 7,
            controlled: false,
        };
        let words = record.to_words();
        assert_eq!(words.len(), SecyRecord::WORDS as usize);
        assert_eq!(words[0] & VALID, VALID);
        assert_eq!(words[0] & SECY_CONTROLLED, 0);
        assert_eq!(words[2], 0xc100_002a);
        assert_eq!(words[3], 0x0001);
        assert_eq!(SecyRecord::from_words(&words), record);
    }

    #[test]
    fn test_rule_record_keeps_wildcards() {
        let pattern = MatchPattern::new(MatchPriority::High)
            .with_ethertype(EtherType::PTP)
            .with_vlan(TagMatch::Vid(VlanId::new(100).unwrap()))
            .with_inner_vlan(TagMatch::Absent)
            .with_control(false);
        let decoded = MatchPattern::from_words(&pattern.to_words());
        assert_eq!(decoded, pattern);
        assert_eq!(decoded.src_mac, None);
    }

    #[test]
    fn test_sa_record_splits_pn() {
        let record = SaRecord {
            active: true,
            xpn: true,
            pn: 0x1_0000_0005,
            ..Default::default()
        };
        let words = record.to_words();
        assert_eq!(words[1], 5);
        assert_eq!(words[2], 1);
        assert_eq!(SaRecord::from_words(&words), record);
    }

    #[test]
    fn test_key_words_layout() {
        let sak = Sak::with_salt(&[0x11; 16], [0x22; 16], [0x33; 12]).unwrap();
        let words = key_words(&sak);
        assert_eq!(words[0], 0x1111_1111);
        assert_eq!(words[4], 0);
        assert_eq!(words[8], 0x2222_2222);
        assert_eq!(words[14], 0x3333_3333);
    }

    #[test]
    fn test_key_words_clear() {
        let sak = Sak::new(&[0x5a; 32], [0xa5; 16]).unwrap();
        let mut words = key_words(&sak);
        assert!(words.iter().any(|w| *w != 0));
        words.clear();
        assert_eq!(&words[..], &[0u32; SA_KEY_WORDS as usize][..]);
    }

    #[test]
    fn test_rule_slots_do_not_overlap() {
        let a = rule_base(0, Direction::Egress, MatchAction::Drop).offset();
        let b = rule_base(1, Direction::Ingress, MatchAction::ControlledPort).offset();
        assert_eq!(b - a, RULE_STRIDE);
        assert!(MatchPattern::WORDS <= RULE_STRIDE);
    }

    #[test]
    fn test_event_sa_encoding() {
        let raw = encode_event_sa(3, AssocNum::AN2);
        assert_eq!(decode_event_sa(raw), Some((3, AssocNum::AN2)));
        assert_eq!(decode_event_sa(0), None);
        assert_eq!(decode_encoding_sa(encode_encoding_sa(None)), None);
    }

    #[test]
    fn test_counter_groups_are_disjoint() {
        let (tx_sa0_lo, _) = counter_csrs(
            CounterGroup::TxSa {
                slot: 0,
                an: AssocNum::AN0,
            },
            1,
        );
        let (tx_sa1_lo, _) = counter_csrs(
            CounterGroup::TxSa {
                slot: 0,
                an: AssocNum::AN1,
            },
            0,
        );
        assert!(tx_sa0_lo.addr < tx_sa1_lo.addr);
    }

    #[test]
    fn test_port_counter_groups_fit_their_stride() {
        let fields = CounterGroup::Common.field_count() as u32;
        let (_, last_hi) = counter_csrs(CounterGroup::Uncontrolled, fields as usize - 1);
        let (common_lo, _) = counter_csrs(CounterGroup::Common, 0);
        assert!(last_hi.addr < common_lo.addr);

        let (slot0_hi, slot1_lo) = (
            counter_csrs(CounterGroup::Controlled { slot: 0 }, fields as usize - 1).1,
            counter_csrs(CounterGroup::Controlled { slot: 1 }, 0).0,
        );
        assert!(slot0_hi.addr < slot1_lo.addr);
        assert!(SECY_TAG_BYPASS_WORD < SECY_STRIDE);
    }
}
