//! Counter groups.
//!
//! Each group is a fixed list of 64-bit counters stored as lo/hi register
//! pairs. Groups are cleared independently.

use crate::conf::MacBlock;
use macsec_types::AssocNum;
use serde::Serialize;

macro_rules! counter_group {
    ($(#[$meta:meta])* $name:ident { $($field:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
        pub struct $name {
            $(pub $field: u64,)+
        }

        impl $name {
            /// Field names in register order.
            pub const FIELDS: &'static [&'static str] = &[$(stringify!($field)),+];

            /// Builds the group from raw values in register order; missing
            /// values read as zero.
            pub fn from_raw(raw: &[u64]) -> Self {
                let mut values = raw.iter().copied();
                $name {
                    $($field: values.next().unwrap_or(0),)+
                }
            }

            /// Raw values in register order.
            pub fn to_raw(&self) -> Vec<u64> {
                vec![$(self.$field),+]
            }
        }

        impl CounterSet for $name {
            fn from_raw(raw: &[u64]) -> Self {
                $name::from_raw(raw)
            }

            fn to_raw(&self) -> Vec<u64> {
                $name::to_raw(self)
            }
        }
    };
}

/// A counter struct that maps onto one group's registers.
pub trait CounterSet: Sized {
    fn from_raw(raw: &[u64]) -> Self;

    fn to_raw(&self) -> Vec<u64>;
}

counter_group!(
    /// Per-SecY counters.
    SecyCounters {
        out_pkts_untagged,
        out_pkts_too_long,
        out_pkts_protected,
        out_pkts_encrypted,
        out_octets_protected,
        out_octets_encrypted,
        in_pkts_untagged,
        in_pkts_no_tag,
        in_pkts_bad_tag,
        in_pkts_unknown_sci,
        in_pkts_no_sci,
        in_pkts_overrun,
        in_octets_validated,
        in_octets_decrypted,
    }
);

counter_group!(
    /// Transmit secure channel counters.
    TxScCounters {
        out_pkts_protected,
        out_pkts_encrypted,
        out_octets_protected,
        out_octets_encrypted,
    }
);

counter_group!(
    /// Transmit secure association counters.
    TxSaCounters {
        out_pkts_protected,
        out_pkts_encrypted,
    }
);

counter_group!(
    /// Receive secure channel counters.
    RxScCounters {
        in_pkts_ok,
        in_pkts_invalid,
        in_pkts_not_valid,
        in_pkts_not_using_sa,
        in_pkts_unused_sa,
        in_pkts_late,
        in_pkts_delayed,
        in_pkts_unchecked,
        in_octets_validated,
        in_octets_decrypted,
    }
);

counter_group!(
    /// Receive secure association counters.
    RxSaCounters {
        in_pkts_ok,
        in_pkts_invalid,
        in_pkts_not_valid,
        in_pkts_not_using_sa,
        in_pkts_unused_sa,
    }
);

counter_group!(
    /// Host- or line-side MAC block counters.
    MacCounters {
        rx_unicast,
        rx_multicast,
        rx_broadcast,
        rx_octets,
        tx_unicast,
        tx_multicast,
        tx_broadcast,
        tx_octets,
    }
);

counter_group!(
    /// 802.1AE interface counters of a controlled, uncontrolled or common
    /// port.
    PortCounters {
        if_in_octets,
        if_in_ucast_pkts,
        if_in_multicast_pkts,
        if_in_broadcast_pkts,
        if_in_discards,
        if_in_errors,
        if_out_octets,
        if_out_ucast_pkts,
        if_out_multicast_pkts,
        if_out_broadcast_pkts,
        if_out_discards,
        if_out_errors,
    }
);

/// Addresses one counter group in hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterGroup {
    Secy { slot: u8 },
    TxSc { slot: u8 },
    TxSa { slot: u8, an: AssocNum },
    RxSc { rx_slot: u8 },
    RxSa { rx_slot: u8, an: AssocNum },
    Mac(MacBlock),
    /// Controlled port of the SecY in `slot`.
    Controlled { slot: u8 },
    /// Frames passed around every SecY.
    Uncontrolled,
    /// Every frame on the line side.
    Common,
}

impl CounterGroup {
    pub fn field_count(&self) -> usize {
        match self {
            CounterGroup::Secy { .. } => SecyCounters::FIELDS.len(),
            CounterGroup::TxSc { .. } => TxScCounters::FIELDS.len(),
            CounterGroup::TxSa { .. } => TxSaCounters::FIELDS.len(),
            CounterGroup::RxSc { .. } => RxScCounters::FIELDS.len(),
            CounterGroup::RxSa { .. } => RxSaCounters::FIELDS.len(),
            CounterGroup::Mac(_) => MacCounters::FIELDS.len(),
            CounterGroup::Controlled { .. } | CounterGroup::Uncontrolled | CounterGroup::Common => {
                PortCounters::FIELDS.len()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_raw_in_register_order() {
        let counters = TxScCounters::from_raw(&[1, 2, 3, 4]);
        assert_eq!(
            counters,
            TxScCounters {
                out_pkts_protected: 1,
                out_pkts_encrypted: 2,
                out_octets_protected: 3,
                out_octets_encrypted: 4,
            }
        );
    }

    #[test]
    fn test_short_raw_reads_zero() {
        let counters = RxSaCounters::from_raw(&[9]);
        assert_eq!(counters.in_pkts_ok, 9);
        assert_eq!(counters.in_pkts_unused_sa, 0);
    }

    #[test]
    fn test_to_raw_matches_fields() {
        let counters = MacCounters {
            tx_octets: 64,
            ..Default::default()
        };
        let raw = counters.to_raw();
        assert_eq!(raw.len(), MacCounters::FIELDS.len());
        assert_eq!(raw[7], 64);
    }

    #[test]
    fn test_field_counts() {
        assert_eq!(CounterGroup::Secy { slot: 0 }.field_count(), 14);
        assert_eq!(CounterGroup::Mac(MacBlock::Line).field_count(), 8);
        assert_eq!(SecyCounters::FIELDS[2], "out_pkts_protected");
        assert_eq!(CounterGroup::Common.field_count(), 12);
        assert_eq!(PortCounters::FIELDS[6], "if_out_octets");
    }
}
