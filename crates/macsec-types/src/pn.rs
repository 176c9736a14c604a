//! Packet number cursors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the packet-number space, fixed by the cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PnWidth {
    /// 32-bit packet numbers (GCM-AES-128/256).
    Pn32,
    /// 64-bit extended packet numbers (GCM-AES-XPN-128/256).
    Xpn64,
}

impl PnWidth {
    /// Largest representable cursor value.
    pub const fn max(&self) -> u64 {
        match self {
            PnWidth::Pn32 => u32::MAX as u64,
            PnWidth::Xpn64 => u64::MAX,
        }
    }
}

impl fmt::Display for PnWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PnWidth::Pn32 => write!(f, "PN"),
            PnWidth::Xpn64 => write!(f, "XPN"),
        }
    }
}

/// A packet-number cursor value tagged with its width.
///
/// `next_pn` for transmit associations, `lowest_pn` for receive ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketNumber {
    Pn(u32),
    Xpn(u64),
}

impl PacketNumber {
    /// Builds a cursor of the given width, truncating to 32 bits for PN.
    pub const fn from_raw(width: PnWidth, value: u64) -> Self {
        match width {
            PnWidth::Pn32 => PacketNumber::Pn(value as u32),
            PnWidth::Xpn64 => PacketNumber::Xpn(value),
        }
    }

    pub const fn width(&self) -> PnWidth {
        match self {
            PacketNumber::Pn(_) => PnWidth::Pn32,
            PacketNumber::Xpn(_) => PnWidth::Xpn64,
        }
    }

    pub const fn as_u64(&self) -> u64 {
        match self {
            PacketNumber::Pn(pn) => *pn as u64,
            PacketNumber::Xpn(xpn) => *xpn,
        }
    }

    pub const fn is_zero(&self) -> bool {
        self.as_u64() == 0
    }
}

impl fmt::Display for PacketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u64())
    }
}

impl From<u32> for PacketNumber {
    fn from(pn: u32) -> Self {
        PacketNumber::Pn(pn)
    }
}

impl From<u64> for PacketNumber {
    fn from(xpn: u64) -> Self {
        PacketNumber::Xpn(xpn)
    }
}
