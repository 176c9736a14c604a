//! Frame descriptors and rule matching.
//!
//! Both the register driver's users and the emulated datapath resolve
//! frames through [`resolve`], so precedence is defined in exactly one place.

use crate::conf::{ControlFrameMatch, MatchAction};
use macsec_types::{AssocNum, EtherType, MacAddress, Sci, VlanId};
use serde::{Deserialize, Serialize};

/// Rule priority. High-priority rules are evaluated before low-priority ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPriority {
    High,
    #[default]
    Low,
}

/// VLAN tag predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMatch {
    /// Frame carries no tag at this position.
    Absent,
    /// Frame carries a tag with any VID.
    Present,
    /// Frame carries a tag with this VID.
    Vid(VlanId),
}

impl TagMatch {
    fn matches(&self, tag: Option<VlanId>) -> bool {
        match (self, tag) {
            (TagMatch::Absent, None) => true,
            (TagMatch::Present, Some(_)) => true,
            (TagMatch::Vid(want), Some(vid)) => *want == vid,
            _ => false,
        }
    }
}

/// Match predicate of a classification rule. `None` fields are wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPattern {
    pub priority: MatchPriority,
    pub ethertype: Option<EtherType>,
    pub vlan: Option<TagMatch>,
    pub inner_vlan: Option<TagMatch>,
    pub src_mac: Option<MacAddress>,
    pub dest_mac: Option<MacAddress>,
    pub is_control: Option<bool>,
}

impl MatchPattern {
    pub fn new(priority: MatchPriority) -> Self {
        MatchPattern {
            priority,
            ..Default::default()
        }
    }

    pub fn with_ethertype(mut self, ethertype: EtherType) -> Self {
        self.ethertype = Some(ethertype);
        self
    }

    pub fn with_vlan(mut self, tag: TagMatch) -> Self {
        self.vlan = Some(tag);
        self
    }

    pub fn with_inner_vlan(mut self, tag: TagMatch) -> Self {
        self.inner_vlan = Some(tag);
        self
    }

    pub fn with_src_mac(mut self, mac: MacAddress) -> Self {
        self.src_mac = Some(mac);
        self
    }

    pub fn with_dest_mac(mut self, mac: MacAddress) -> Self {
        self.dest_mac = Some(mac);
        self
    }

    pub fn with_control(mut self, is_control: bool) -> Self {
        self.is_control = Some(is_control);
        self
    }

    /// Structural match. `control` is the frame's control-frame status as
    /// decided by the port's control-frame rules.
    pub fn matches(&self, frame: &Frame, control: bool) -> bool {
        self.ethertype.map_or(true, |etype| etype == frame.ethertype)
            && self.vlan.map_or(true, |tag| tag.matches(frame.vlan))
            && self.inner_vlan.map_or(true, |tag| tag.matches(frame.inner_vlan))
            && self.src_mac.map_or(true, |mac| mac == frame.src_mac)
            && self.dest_mac.map_or(true, |mac| mac == frame.dest_mac)
            && self.is_control.map_or(true, |want| want == control)
    }
}

/// SecTAG fields of a received MACsec frame.
///
/// `icv_ok` stands in for the hardware's integrity check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecTag {
    pub an: AssocNum,
    pub pn: u64,
    pub sci: Option<Sci>,
    pub encrypted: bool,
    pub icv_ok: bool,
}

/// Frame as seen by the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub dest_mac: MacAddress,
    pub src_mac: MacAddress,
    pub vlan: Option<VlanId>,
    pub inner_vlan: Option<VlanId>,
    pub ethertype: EtherType,
    pub sectag: Option<SecTag>,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(dest_mac: MacAddress, src_mac: MacAddress, ethertype: EtherType) -> Self {
        Frame {
            dest_mac,
            src_mac,
            vlan: None,
            inner_vlan: None,
            ethertype,
            sectag: None,
            payload: Vec::new(),
        }
    }

    pub fn with_vlan(mut self, vlan: VlanId) -> Self {
        self.vlan = Some(vlan);
        self
    }

    pub fn with_inner_vlan(mut self, vlan: VlanId) -> Self {
        self.inner_vlan = Some(vlan);
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Turns the frame into a MACsec frame carrying `sectag`.
    pub fn with_sectag(mut self, sectag: SecTag) -> Self {
        self.ethertype = EtherType::MACSEC;
        self.sectag = Some(sectag);
        self
    }

    pub fn is_macsec(&self) -> bool {
        self.sectag.is_some()
    }

    /// Serialises the header, SecTAG and payload (no FCS).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(32 + self.payload.len());
        bytes.extend_from_slice(self.dest_mac.as_bytes());
        bytes.extend_from_slice(self.src_mac.as_bytes());
        for tag in [self.vlan, self.inner_vlan].into_iter().flatten() {
            bytes.extend_from_slice(&EtherType::VLAN.as_u16().to_be_bytes());
            bytes.extend_from_slice(&tag.as_u16().to_be_bytes());
        }
        bytes.extend_from_slice(&self.ethertype.as_u16().to_be_bytes());
        if let Some(sectag) = &self.sectag {
            let mut tci = sectag.an.as_u8();
            if sectag.sci.is_some() {
                tci |= 0x20;
            }
            if sectag.encrypted {
                tci |= 0x0c;
            }
            bytes.push(tci);
            bytes.push(0);
            bytes.extend_from_slice(&(sectag.pn as u32).to_be_bytes());
            if let Some(sci) = sectag.sci {
                bytes.extend_from_slice(&sci.to_bytes());
            }
        }
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Length on the wire, FCS included.
    pub fn wire_len(&self) -> usize {
        self.to_bytes().len().max(60) + 4
    }
}

impl ControlFrameMatch {
    pub fn matches(&self, frame: &Frame) -> bool {
        if self.ethertype.is_none() && self.dest_mac.is_none() {
            return false;
        }
        self.ethertype.map_or(true, |etype| etype == frame.ethertype)
            && self.dest_mac.map_or(true, |mac| mac == frame.dest_mac)
    }
}

/// True when any of the port's control-frame rules matches.
pub fn is_control_frame<'a>(
    rules: impl IntoIterator<Item = &'a ControlFrameMatch>,
    frame: &Frame,
) -> bool {
    rules.into_iter().any(|rule| rule.matches(frame))
}

/// Picks the winning rule among `(secy_slot, action, pattern)` candidates.
///
/// High-priority rules beat low-priority rules. Among equal priorities the
/// lower SecY slot wins, then the action order of [`MatchAction`]. `None`
/// means the default-action policy applies.
pub fn resolve<'a>(
    rules: impl IntoIterator<Item = (u8, MatchAction, &'a MatchPattern)>,
    frame: &Frame,
    control: bool,
) -> Option<(u8, MatchAction)> {
    rules
        .into_iter()
        .filter(|(_, _, pattern)| pattern.matches(frame, control))
        .min_by_key(|(slot, action, pattern)| (pattern.priority, *slot, *action))
        .map(|(slot, action, _)| (slot, action))
}
