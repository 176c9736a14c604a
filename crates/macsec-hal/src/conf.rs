//! Configuration records exchanged with the engine.

use crate::error::{MacsecError, MacsecResult};
use bitflags::bitflags;
use macsec_types::{CipherSuite, EtherType, MacAddress};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest confidentiality offset, in bytes.
pub const MAX_CONFIDENTIALITY_OFFSET: u8 = 64;

/// Largest replay window for XPN suites (IEEE 802.1AEbw).
pub const MAX_XPN_REPLAY_WINDOW: u32 = 1 << 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ingress,
    Egress,
}

impl Direction {
    pub const fn index(&self) -> u32 {
        match self {
            Direction::Ingress => 0,
            Direction::Egress => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ingress => write!(f, "ingress"),
            Direction::Egress => write!(f, "egress"),
        }
    }
}

/// Engine bypass state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassMode {
    /// Leave the current bypass setting alone.
    #[default]
    None,
    /// Pass all traffic around the engine.
    Enable,
    /// Route traffic through the engine.
    Disable,
}

impl BypassMode {
    pub const fn to_raw(&self) -> u32 {
        match self {
            BypassMode::None => 0,
            BypassMode::Enable => 1,
            BypassMode::Disable => 2,
        }
    }

    pub const fn from_raw(raw: u32) -> Self {
        match raw & 0x3 {
            1 => BypassMode::Enable,
            2 => BypassMode::Disable,
            _ => BypassMode::None,
        }
    }
}

/// Port-level engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InitConf {
    pub enable: bool,
    pub bypass: BypassMode,
    /// Drop non-MACsec frames arriving on the line side.
    pub ingress_drop_non_macsec: bool,
    pub lmac_disable_length_validate: bool,
    pub hmac_disable_length_validate: bool,
}

/// Frame validation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidateFrames {
    Disabled,
    Check,
    #[default]
    Strict,
}

impl ValidateFrames {
    pub const fn to_raw(&self) -> u32 {
        match self {
            ValidateFrames::Disabled => 0,
            ValidateFrames::Check => 1,
            ValidateFrames::Strict => 2,
        }
    }

    pub const fn from_raw(raw: u32) -> Self {
        match raw & 0x3 {
            0 => ValidateFrames::Disabled,
            1 => ValidateFrames::Check,
            _ => ValidateFrames::Strict,
        }
    }
}

/// SecY configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecyConf {
    pub mac_addr: MacAddress,
    pub validate_frames: ValidateFrames,
    pub replay_protect: bool,
    pub replay_window: u32,
    pub protect_frames: bool,
    pub always_include_sci: bool,
    pub use_es: bool,
    pub use_scb: bool,
    pub cipher_suite: CipherSuite,
    pub confidentiality_offset: u8,
}

impl Default for SecyConf {
    fn default() -> Self {
        SecyConf {
            mac_addr: MacAddress::ZERO,
            validate_frames: ValidateFrames::Strict,
            replay_protect: false,
            replay_window: 0,
            protect_frames: true,
            always_include_sci: false,
            use_es: false,
            use_scb: false,
            cipher_suite: CipherSuite::GcmAes128,
            confidentiality_offset: 0,
        }
    }
}

impl SecyConf {
    pub fn validate(&self) -> MacsecResult<()> {
        if self.mac_addr.is_zero() || self.mac_addr.is_multicast() {
            return Err(MacsecError::invalid_argument(format!(
                "SecY MAC address {} must be a non-zero unicast address",
                self.mac_addr
            )));
        }
        check_confidentiality_offset(self.confidentiality_offset)?;
        check_replay_window(self.cipher_suite, self.replay_window)
    }
}

pub(crate) fn check_confidentiality_offset(offset: u8) -> MacsecResult<()> {
    if offset > MAX_CONFIDENTIALITY_OFFSET {
        return Err(MacsecError::invalid_argument(format!(
            "confidentiality offset {} exceeds {}",
            offset, MAX_CONFIDENTIALITY_OFFSET
        )));
    }
    Ok(())
}

pub(crate) fn check_replay_window(suite: CipherSuite, window: u32) -> MacsecResult<()> {
    if suite.is_xpn() && window > MAX_XPN_REPLAY_WINDOW {
        return Err(MacsecError::invalid_argument(format!(
            "replay window {} exceeds the XPN limit {}",
            window, MAX_XPN_REPLAY_WINDOW
        )));
    }
    Ok(())
}

/// Transmit-channel override of the SecY defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxScConf {
    pub protect_frames: bool,
    pub always_include_sci: bool,
    pub use_es: bool,
    pub use_scb: bool,
    pub confidentiality_offset: u8,
}

impl TxScConf {
    pub fn from_secy(conf: &SecyConf) -> Self {
        TxScConf {
            protect_frames: conf.protect_frames,
            always_include_sci: conf.always_include_sci,
            use_es: conf.use_es,
            use_scb: conf.use_scb,
            confidentiality_offset: conf.confidentiality_offset,
        }
    }

    pub fn validate(&self) -> MacsecResult<()> {
        check_confidentiality_offset(self.confidentiality_offset)
    }
}

/// Receive-channel override of the SecY defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RxScConf {
    pub validate_frames: ValidateFrames,
    pub replay_protect: bool,
    pub replay_window: u32,
    pub confidentiality_offset: u8,
}

impl RxScConf {
    pub fn from_secy(conf: &SecyConf) -> Self {
        RxScConf {
            validate_frames: conf.validate_frames,
            replay_protect: conf.replay_protect,
            replay_window: conf.replay_window,
            confidentiality_offset: conf.confidentiality_offset,
        }
    }

    pub fn validate(&self, suite: CipherSuite) -> MacsecResult<()> {
        check_confidentiality_offset(self.confidentiality_offset)?;
        check_replay_window(suite, self.replay_window)
    }
}

/// Where a classification rule sends matching frames.
///
/// The declaration order is also the tie-break order between equal-priority
/// rules of one SecY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchAction {
    ControlledPort,
    UncontrolledPort,
    Drop,
}

impl MatchAction {
    pub const ALL: [MatchAction; 3] = [
        MatchAction::ControlledPort,
        MatchAction::UncontrolledPort,
        MatchAction::Drop,
    ];

    pub const fn index(&self) -> u32 {
        match self {
            MatchAction::ControlledPort => 0,
            MatchAction::UncontrolledPort => 1,
            MatchAction::Drop => 2,
        }
    }
}

impl fmt::Display for MatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchAction::ControlledPort => write!(f, "controlled_port"),
            MatchAction::UncontrolledPort => write!(f, "uncontrolled_port"),
            MatchAction::Drop => write!(f, "drop"),
        }
    }
}

/// Action for frames that match no rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultAction {
    #[default]
    Drop,
    /// Forward unmodified, around the SecY.
    Bypass,
}

/// Default-action policy, one entry per frame class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultActionPolicy {
    pub ingress_control_macsec: DefaultAction,
    pub ingress_non_control_macsec: DefaultAction,
    pub ingress_control_non_macsec: DefaultAction,
    pub ingress_non_control_non_macsec: DefaultAction,
    pub egress_control: DefaultAction,
    pub egress_non_control: DefaultAction,
}

impl DefaultActionPolicy {
    pub const fn all(action: DefaultAction) -> Self {
        DefaultActionPolicy {
            ingress_control_macsec: action,
            ingress_non_control_macsec: action,
            ingress_control_non_macsec: action,
            ingress_non_control_non_macsec: action,
            egress_control: action,
            egress_non_control: action,
        }
    }

    /// Selects the entry for a frame class. `macsec` is ignored on egress.
    pub fn action_for(&self, direction: Direction, control: bool, macsec: bool) -> DefaultAction {
        match (direction, control, macsec) {
            (Direction::Ingress, true, true) => self.ingress_control_macsec,
            (Direction::Ingress, false, true) => self.ingress_non_control_macsec,
            (Direction::Ingress, true, false) => self.ingress_control_non_macsec,
            (Direction::Ingress, false, false) => self.ingress_non_control_non_macsec,
            (Direction::Egress, true, _) => self.egress_control,
            (Direction::Egress, false, _) => self.egress_non_control,
        }
    }

    fn fields(&self) -> [DefaultAction; 6] {
        [
            self.ingress_control_macsec,
            self.ingress_non_control_macsec,
            self.ingress_control_non_macsec,
            self.ingress_non_control_non_macsec,
            self.egress_control,
            self.egress_non_control,
        ]
    }

    /// One bit per class, set for Bypass.
    pub fn to_raw(&self) -> u32 {
        self.fields()
            .iter()
            .enumerate()
            .filter(|(_, action)| **action == DefaultAction::Bypass)
            .fold(0, |acc, (bit, _)| acc | (1 << bit))
    }

    pub fn from_raw(raw: u32) -> Self {
        let action = |bit: u32| {
            if raw & (1 << bit) != 0 {
                DefaultAction::Bypass
            } else {
                DefaultAction::Drop
            }
        };
        DefaultActionPolicy {
            ingress_control_macsec: action(0),
            ingress_non_control_macsec: action(1),
            ingress_control_non_macsec: action(2),
            ingress_non_control_non_macsec: action(3),
            egress_control: action(4),
            egress_non_control: action(5),
        }
    }
}

/// Port-level rule identifying control frames, by EtherType and/or
/// destination MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlFrameMatch {
    pub ethertype: Option<EtherType>,
    pub dest_mac: Option<MacAddress>,
}

impl ControlFrameMatch {
    pub fn validate(&self) -> MacsecResult<()> {
        if self.ethertype.is_none() && self.dest_mac.is_none() {
            return Err(MacsecError::invalid_argument(
                "control frame match needs an EtherType or a destination MAC",
            ));
        }
        Ok(())
    }
}

bitflags! {
    /// Sequence events reported by the engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventMask: u32 {
        /// An active transmit SA's packet number wrapped.
        const ROLLOVER = 0x0000_0001;
        /// An active transmit SA's packet number crossed the threshold.
        const SEQ_THRESHOLD = 0x0000_0002;
    }
}

/// One-shot frame capture arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameCapture {
    #[default]
    Disabled,
    Ingress,
    Egress,
}

impl FrameCapture {
    pub const fn to_raw(&self) -> u32 {
        match self {
            FrameCapture::Disabled => 0,
            FrameCapture::Ingress => 1,
            FrameCapture::Egress => 2,
        }
    }

    pub const fn from_raw(raw: u32) -> Self {
        match raw & 0x3 {
            1 => FrameCapture::Ingress,
            2 => FrameCapture::Egress,
            _ => FrameCapture::Disabled,
        }
    }
}

/// VLAN tags left in clear ahead of the SecTAG on protected egress frames.
/// Tags not bypassed travel inside the secured data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagBypass {
    #[default]
    None,
    /// Outer tag only.
    Tag,
    /// Every tag header.
    Header,
}

impl TagBypass {
    pub const fn to_raw(&self) -> u32 {
        match self {
            TagBypass::None => 0,
            TagBypass::Tag => 1,
            TagBypass::Header => 2,
        }
    }

    pub const fn from_raw(raw: u32) -> Self {
        match raw & 0x3 {
            1 => TagBypass::Tag,
            2 => TagBypass::Header,
            _ => TagBypass::None,
        }
    }

    /// Number of leading VLAN tags kept in clear.
    pub const fn clear_tags(&self) -> usize {
        match self {
            TagBypass::None => 0,
            TagBypass::Tag => 1,
            TagBypass::Header => 2,
        }
    }
}

/// Frame drained from the capture buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Length of the captured frame on the wire.
    pub length: usize,
    /// Leading bytes, at most the requested maximum.
    pub bytes: Vec<u8>,
}

/// MAC block facing the host or the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacBlock {
    Host,
    Line,
}
