//! Ethernet type field.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 16-bit EtherType value as carried after the MAC addresses and VLAN tags.
///
/// Parses from `0x88e5`-style hex or plain decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EtherType(u16);

impl EtherType {
    pub const IPV4: EtherType = EtherType(0x0800);
    pub const ARP: EtherType = EtherType(0x0806);
    pub const VLAN: EtherType = EtherType(0x8100);
    pub const QINQ: EtherType = EtherType(0x88a8);
    pub const IPV6: EtherType = EtherType(0x86dd);
    pub const SLOW_PROTOCOLS: EtherType = EtherType(0x8809);
    pub const EAPOL: EtherType = EtherType(0x888e);
    /// IEEE 802.1AE SecTAG.
    pub const MACSEC: EtherType = EtherType(0x88e5);
    /// IEEE 1588 precision time protocol.
    pub const PTP: EtherType = EtherType(0x88f7);

    pub const fn new(value: u16) -> Self {
        EtherType(value)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl FromStr for EtherType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u16::from_str_radix(hex, 16),
            None => s.parse::<u16>(),
        };
        parsed
            .map(EtherType)
            .map_err(|_| ParseError::InvalidEtherType(s.to_string()))
    }
}

impl TryFrom<String> for EtherType {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EtherType> for String {
    fn from(etype: EtherType) -> String {
        etype.to_string()
    }
}

impl From<u16> for EtherType {
    fn from(value: u16) -> Self {
        EtherType(value)
    }
}
