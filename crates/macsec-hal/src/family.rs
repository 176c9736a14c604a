//! PHY families and their MACsec capabilities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// PHY family, selected once when a port is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhyFamily {
    /// 10G Malibu (VSC8256/8257/8258).
    Malibu10g,
    /// 25G Malibu.
    Malibu25g,
    /// 1G Viper (VSC8582/8584/8575/8564/8562/8586).
    Viper,
    /// 1G Tesla (VSC8574/8504/8572/8552); no MACsec engine.
    Tesla,
    /// LAN8814-class quad PHY.
    Indy,
}

/// What a family's MACsec engine offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub macsec: bool,
    /// 64-bit packet numbers; also gates the sequence-threshold event.
    pub xpn: bool,
    pub max_secy: u8,
    pub max_rx_sc: u8,
    pub frame_capture: bool,
    pub control_frame_rules: u8,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        macsec: false,
        xpn: false,
        max_secy: 0,
        max_rx_sc: 0,
        frame_capture: false,
        control_frame_rules: 0,
    };
}

impl PhyFamily {
    pub const fn capabilities(&self) -> Capabilities {
        match self {
            PhyFamily::Malibu10g | PhyFamily::Viper => Capabilities {
                macsec: true,
                xpn: false,
                max_secy: 2,
                max_rx_sc: 4,
                frame_capture: true,
                control_frame_rules: 8,
            },
            PhyFamily::Malibu25g => Capabilities {
                macsec: true,
                xpn: true,
                max_secy: 4,
                max_rx_sc: 8,
                frame_capture: true,
                control_frame_rules: 8,
            },
            PhyFamily::Indy => Capabilities {
                macsec: true,
                xpn: true,
                max_secy: 1,
                max_rx_sc: 4,
                frame_capture: false,
                control_frame_rules: 4,
            },
            PhyFamily::Tesla => Capabilities::NONE,
        }
    }

    /// Identifies the family from the PHY part number.
    ///
    /// 25G Malibu parts are not reported through the part-number register and
    /// must be attached with an explicit [`PortInfo`].
    pub fn detect(part_number: u16) -> Option<PhyFamily> {
        match part_number {
            0x8256 | 0x8257 | 0x8258 => Some(PhyFamily::Malibu10g),
            0x8582 | 0x8584 | 0x8575 | 0x8564 | 0x8562 | 0x8586 => Some(PhyFamily::Viper),
            0x8574 | 0x8504 | 0x8572 | 0x8552 => Some(PhyFamily::Tesla),
            0x8814 => Some(PhyFamily::Indy),
            _ => None,
        }
    }
}

impl fmt::Display for PhyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhyFamily::Malibu10g => "malibu10g",
            PhyFamily::Malibu25g => "malibu25g",
            PhyFamily::Viper => "viper",
            PhyFamily::Tesla => "tesla",
            PhyFamily::Indy => "indy",
        };
        write!(f, "{}", s)
    }
}

/// Enumeration data handed over when a port is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub family: PhyFamily,
    pub macsec_capable: bool,
}

impl PortInfo {
    pub const fn new(family: PhyFamily, macsec_capable: bool) -> Self {
        PortInfo {
            family,
            macsec_capable,
        }
    }

    pub fn from_part_number(part_number: u16) -> Option<Self> {
        PhyFamily::detect(part_number)
            .map(|family| PortInfo::new(family, family.capabilities().macsec))
    }

    /// Effective capabilities: the family's, or none if the board reports this
    /// port without a usable engine.
    pub fn capabilities(&self) -> Capabilities {
        if self.macsec_capable {
            self.family.capabilities()
        } else {
            Capabilities::NONE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_families() {
        assert_eq!(PhyFamily::detect(0x8584), Some(PhyFamily::Viper));
        assert_eq!(PhyFamily::detect(0x8574), Some(PhyFamily::Tesla));
        assert_eq!(PhyFamily::detect(0x8814), Some(PhyFamily::Indy));
        assert_eq!(PhyFamily::detect(0x1234), None);
    }

    #[test]
    fn test_port_info_from_part_number() {
        let info = PortInfo::from_part_number(0x8258).unwrap();
        assert_eq!(info, PortInfo::new(PhyFamily::Malibu10g, true));

        let tesla = PortInfo::from_part_number(0x8504).unwrap();
        assert!(!tesla.macsec_capable);
        assert_eq!(tesla.capabilities(), Capabilities::NONE);
    }

    #[test]
    fn test_board_can_withhold_engine() {
        let info = PortInfo::new(PhyFamily::Viper, false);
        assert_eq!(info.capabilities(), Capabilities::NONE);
    }

    #[test]
    fn test_xpn_split() {
        assert!(!PhyFamily::Viper.capabilities().xpn);
        assert!(!PhyFamily::Malibu10g.capabilities().xpn);
        assert!(PhyFamily::Malibu25g.capabilities().xpn);
        assert!(PhyFamily::Indy.capabilities().xpn);
        assert!(!PhyFamily::Tesla.capabilities().macsec);
    }
}
