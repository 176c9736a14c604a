//! Secure Channel Identifier.

use crate::{MacAddress, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Secure Channel Identifier: the 48-bit system MAC address followed by a
/// 16-bit port identifier, 8 bytes on the wire.
///
/// Ordering follows the 64-bit wire value, which gives Rx SC enumeration a
/// stable order.
///
/// ```
/// use macsec_types::{MacAddress, Sci};
///
/// let sci: Sci = "00:11:22:33:44:55/1".parse().unwrap();
/// assert_eq!(sci.port_id(), 1);
/// assert_eq!(sci.to_u64(), 0x0011_2233_4455_0001);
/// assert_eq!(Sci::from_u64(0x0011_2233_4455_0001), sci);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sci {
    mac: MacAddress,
    port_id: u16,
}

impl Sci {
    pub const fn new(mac: MacAddress, port_id: u16) -> Self {
        Sci { mac, port_id }
    }

    pub const fn mac(&self) -> MacAddress {
        self.mac
    }

    pub const fn port_id(&self) -> u16 {
        self.port_id
    }

    /// Returns the 64-bit wire representation.
    pub fn to_u64(&self) -> u64 {
        (self.mac.to_u64() << 16) | u64::from(self.port_id)
    }

    pub fn from_u64(value: u64) -> Self {
        Sci {
            mac: MacAddress::from_u64(value >> 16),
            port_id: (value & 0xffff) as u16,
        }
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        self.to_u64().to_be_bytes()
    }
}

impl PartialOrd for Sci {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sci {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_u64().cmp(&other.to_u64())
    }
}

impl fmt::Display for Sci {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.mac, self.port_id)
    }
}

impl FromStr for Sci {
    type Err = ParseError;

    /// Accepts `<mac>/<port_id>` or a 64-bit hex value (`0x0011223344550001`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidSci(s.to_string());

        if let Some(hex) = s.strip_prefix("0x") {
            if hex.is_empty() || hex.len() > 16 {
                return Err(invalid());
            }
            return u64::from_str_radix(hex, 16)
                .map(Sci::from_u64)
                .map_err(|_| invalid());
        }

        let (mac, port_id) = s.split_once('/').ok_or_else(invalid)?;
        let mac: MacAddress = mac.parse().map_err(|_| invalid())?;
        let port_id: u16 = port_id.parse().map_err(|_| invalid())?;
        Ok(Sci::new(mac, port_id))
    }
}

impl TryFrom<String> for Sci {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Sci> for String {
    fn from(sci: Sci) -> String {
        sci.to_string()
    }
}
