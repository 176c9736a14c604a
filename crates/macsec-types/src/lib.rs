//! Key and parameter types for the MACsec control plane.
//!
//! This crate provides type-safe representations of the values that flow
//! through every MACsec configuration call:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`VlanId`]: IEEE 802.1Q VLAN identifiers
//! - [`EtherType`]: 16-bit Ethernet type field
//! - [`Sci`]: Secure Channel Identifier (`{mac, port_id}`)
//! - [`AssocNum`]: Association Number (0-3)
//! - [`PacketNumber`] / [`PnWidth`]: 32-bit PN and 64-bit XPN cursors
//! - [`CipherSuite`]: GCM-AES cipher selection (which also fixes the PN width)
//! - [`Sak`] / [`Ssci`]: immutable key material, wiped on drop

mod an;
mod cipher;
mod ethertype;
mod key;
mod mac;
mod pn;
mod sci;
mod vlan;

pub use an::AssocNum;
pub use cipher::CipherSuite;
pub use ethertype::EtherType;
pub use key::{wipe, Sak, Ssci};
pub use mac::MacAddress;
pub use pn::{PacketNumber, PnWidth};
pub use sci::Sci;
pub use vlan::VlanId;

/// Common error type for parsing and construction failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),

    #[error("invalid EtherType: {0}")]
    InvalidEtherType(String),

    #[error("invalid SCI format: {0}")]
    InvalidSci(String),

    #[error("invalid association number: {0} (must be 0-3)")]
    InvalidAssocNum(u8),

    #[error("invalid cipher suite: {0}")]
    InvalidCipherSuite(String),

    #[error("invalid key length: {0} bytes (must be 16 or 32)")]
    InvalidKeyLength(usize),
}
