//! Transmit and receive secure channels.

use super::board::{MacsecBoard, PortHw, SOURCE};
use super::types::{RxScEntry, RxScStatus, SecyId, TxScEntry, TxScStatus};
use crate::audit::{AuditCategory, AuditRecord};
use crate::{audit_log, debug_log};
use macsec_hal::regs::{RxScRecord, SaSlot};
use macsec_hal::{MacsecError, MacsecResult, RxScConf, TxScConf};
use macsec_types::Sci;
use std::ops::Bound;

/// Stops encoding, wipes every SA and clears the Tx SC entry. SAs leave the
/// registry as their keys are wiped.
pub(crate) fn teardown_tx_sc(hw: &PortHw, secy_slot: u8, tx: &mut TxScEntry) -> MacsecResult<()> {
    hw.driver.encoding_sa_write(hw.port, secy_slot, None)?;
    for an in tx.sas.ans() {
        hw.driver.sa_clear(hw.port, SaSlot::Tx { secy_slot, an })?;
        tx.sas.remove(an);
    }
    hw.driver.tx_sc_clear(hw.port, secy_slot)
}

pub(crate) fn teardown_rx_sc(hw: &PortHw, rx: &mut RxScEntry) -> MacsecResult<()> {
    let rx_slot = rx.rx_slot;
    for an in rx.sas.ans() {
        hw.driver.sa_clear(hw.port, SaSlot::Rx { rx_slot, an })?;
        rx.sas.remove(an);
    }
    hw.driver.rx_sc_clear(hw.port, rx_slot)
}

fn rx_sc_not_found(id: SecyId, sci: Sci) -> MacsecError {
    MacsecError::not_found(format!("Rx SC {} on SecY {}", sci, id))
}

impl MacsecBoard {
    // Transmit

    /// Creates the SecY's transmit channel with the SecY defaults.
    pub fn tx_sc_create(&self, id: SecyId) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            if secy.tx_sc.is_some() {
                return Err(MacsecError::already_exists(format!("Tx SC on SecY {}", id)));
            }
            hw.driver
                .tx_sc_write(hw.port, secy.slot, &TxScConf::from_secy(&secy.conf))?;
            secy.tx_sc = Some(TxScEntry::new());
            Ok(())
        });
        if result.is_ok() {
            self.bump(|s| s.scs_created = s.scs_created.saturating_add(1));
        }

        audit_log!(
            AuditRecord::new(AuditCategory::ResourceCreate, SOURCE, "tx_sc_create")
                .with_result(&result)
                .with_object_id(id.to_string())
                .with_object_type("macsec_tx_sc")
        );
        result
    }

    /// Overrides the SecY defaults for this channel.
    pub fn tx_sc_update(&self, id: SecyId, conf: TxScConf) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            let tx = secy
                .tx_sc
                .as_mut()
                .ok_or_else(|| MacsecError::not_found(format!("Tx SC on SecY {}", id)))?;
            conf.validate()?;
            hw.driver.tx_sc_write(hw.port, secy.slot, &conf)?;
            tx.conf = Some(conf);
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::ResourceModify, SOURCE, "tx_sc_update")
                .with_result(&result)
                .with_object_id(id.to_string())
                .with_object_type("macsec_tx_sc")
                .with_details(serde_json::json!({
                    "protect_frames": conf.protect_frames,
                    "always_include_sci": conf.always_include_sci,
                    "confidentiality_offset": conf.confidentiality_offset,
                }))
        );
        result
    }

    /// Channel configuration in effect: the override, or the SecY defaults.
    pub fn tx_sc_get(&self, id: SecyId) -> MacsecResult<TxScConf> {
        self.with_secy(id, |_, secy| {
            secy.tx_sc
                .as_ref()
                .map(|tx| tx.effective_conf(&secy.conf))
                .ok_or_else(|| MacsecError::not_found(format!("Tx SC on SecY {}", id)))
        })
    }

    /// Deletes the transmit channel and every transmit SA on it.
    pub fn tx_sc_delete(&self, id: SecyId) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            let tx = secy
                .tx_sc
                .as_mut()
                .ok_or_else(|| MacsecError::not_found(format!("Tx SC on SecY {}", id)))?;
            teardown_tx_sc(hw, secy.slot, tx)?;
            secy.tx_sc = None;
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::ResourceDelete, SOURCE, "tx_sc_delete")
                .with_result(&result)
                .with_object_id(id.to_string())
                .with_object_type("macsec_tx_sc")
        );
        result
    }

    pub fn tx_sc_status(&self, id: SecyId) -> MacsecResult<TxScStatus> {
        self.with_secy(id, |_, secy| {
            let tx = secy
                .tx_sc
                .as_ref()
                .ok_or_else(|| MacsecError::not_found(format!("Tx SC on SecY {}", id)))?;
            let encoding_sa = tx.encoding_an();
            let enciphering_sa = encoding_sa.filter(|an| {
                tx.sas.get(*an).map_or(false, |sa| sa.confidential)
            });
            Ok(TxScStatus {
                sci: Sci::new(secy.conf.mac_addr, id.port_id),
                transmitting: encoding_sa.is_some() && secy.controlled,
                encoding_sa,
                enciphering_sa,
                created_time: tx.created,
                started_time: tx.started,
                stopped_time: tx.stopped,
            })
        })
    }

    // Receive

    /// Adds a receive channel for the peer `sci` in the lowest free Rx SC
    /// slot of the port.
    pub fn rx_sc_add(&self, id: SecyId, sci: Sci) -> MacsecResult<()> {
        let result = self.with_engine(id.port, |entry| {
            if entry.secy(id)?.rx_scs.contains_key(&sci) {
                return Err(MacsecError::already_exists(format!(
                    "Rx SC {} on SecY {}",
                    sci, id
                )));
            }
            let rx_slot = entry.free_rx_slot()?;
            let (hw, secy) = entry.secy_mut(id)?;
            hw.driver.rx_sc_write(
                hw.port,
                rx_slot,
                &RxScRecord {
                    secy_slot: secy.slot,
                    sci,
                    conf: RxScConf::from_secy(&secy.conf),
                },
            )?;
            secy.rx_scs.insert(sci, RxScEntry::new(rx_slot));
            Ok(rx_slot)
        });
        if result.is_ok() {
            self.bump(|s| s.scs_created = s.scs_created.saturating_add(1));
        }

        audit_log!(
            AuditRecord::new(AuditCategory::ResourceCreate, SOURCE, "rx_sc_add")
                .with_result(&result)
                .with_object_id(format!("{}/{}", id, sci))
                .with_object_type("macsec_rx_sc")
                .with_details(serde_json::json!({ "rx_slot": result.as_ref().ok() }))
        );
        result.map(|_| ())
    }

    /// Overrides the SecY defaults for one receive channel.
    pub fn rx_sc_update(&self, id: SecyId, sci: Sci, conf: RxScConf) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            conf.validate(secy.conf.cipher_suite)?;
            let secy_slot = secy.slot;
            let rx = secy
                .rx_scs
                .get_mut(&sci)
                .ok_or_else(|| rx_sc_not_found(id, sci))?;
            hw.driver.rx_sc_write(
                hw.port,
                rx.rx_slot,
                &RxScRecord {
                    secy_slot,
                    sci,
                    conf,
                },
            )?;
            rx.conf = Some(conf);
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::ResourceModify, SOURCE, "rx_sc_update")
                .with_result(&result)
                .with_object_id(format!("{}/{}", id, sci))
                .with_object_type("macsec_rx_sc")
                .with_details(serde_json::json!({
                    "validate_frames": conf.validate_frames,
                    "replay_protect": conf.replay_protect,
                    "replay_window": conf.replay_window,
                }))
        );
        result
    }

    pub fn rx_sc_get_conf(&self, id: SecyId, sci: Sci) -> MacsecResult<RxScConf> {
        self.with_secy(id, |_, secy| {
            secy.rx_scs
                .get(&sci)
                .map(|rx| rx.effective_conf(&secy.conf))
                .ok_or_else(|| rx_sc_not_found(id, sci))
        })
    }

    /// Receive channel enumeration in SCI order. `None` starts from the first.
    pub fn rx_sc_get_next(&self, id: SecyId, after: Option<Sci>) -> MacsecResult<Sci> {
        self.with_secy(id, |_, secy| {
            let next = match after {
                None => secy.rx_scs.keys().next(),
                Some(after) => secy
                    .rx_scs
                    .range((Bound::Excluded(after), Bound::Unbounded))
                    .map(|(sci, _)| sci)
                    .next(),
            };
            next.copied().ok_or_else(|| {
                MacsecError::not_found(format!("Rx SC after {:?} on SecY {}", after, id))
            })
        })
    }

    /// Deletes a receive channel and every SA on it.
    pub fn rx_sc_delete(&self, id: SecyId, sci: Sci) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            let rx = secy
                .rx_scs
                .get_mut(&sci)
                .ok_or_else(|| rx_sc_not_found(id, sci))?;
            teardown_rx_sc(hw, rx)?;
            debug_log!(SOURCE, secy = %id, sci = %sci, rx_slot = rx.rx_slot, "Rx SC cleared");
            secy.rx_scs.remove(&sci);
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::ResourceDelete, SOURCE, "rx_sc_delete")
                .with_result(&result)
                .with_object_id(format!("{}/{}", id, sci))
                .with_object_type("macsec_rx_sc")
        );
        result
    }

    pub fn rx_sc_status(&self, id: SecyId, sci: Sci) -> MacsecResult<RxScStatus> {
        self.with_secy(id, |_, secy| {
            let rx = secy
                .rx_scs
                .get(&sci)
                .ok_or_else(|| rx_sc_not_found(id, sci))?;
            Ok(RxScStatus {
                receiving: rx.sas.any_active(),
                created_time: rx.created,
                started_time: rx.started,
                stopped_time: rx.stopped,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::macsec::test_support::*;
    use macsec_hal::regs::{self, RxScRecord, SaSlot};
    use macsec_hal::{MacsecError, PhyFamily, RxScConf, TxScConf, ValidateFrames};
    use macsec_types::{AssocNum, CipherSuite, Sci};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tx_sc_lifecycle() {
        let (_sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        assert!(matches!(
            board.tx_sc_get(id()),
            Err(MacsecError::NotFound { .. })
        ));
        board.tx_sc_create(id()).unwrap();
        assert!(matches!(
            board.tx_sc_create(id()),
            Err(MacsecError::AlreadyExists { .. })
        ));
        assert_eq!(
            board.tx_sc_get(id()).unwrap(),
            TxScConf::from_secy(&secy_conf(CipherSuite::GcmAes128))
        );

        let conf = TxScConf {
            protect_frames: false,
            ..board.tx_sc_get(id()).unwrap()
        };
        board.tx_sc_update(id(), conf).unwrap();
        assert_eq!(board.tx_sc_get(id()).unwrap(), conf);

        let status = board.tx_sc_status(id()).unwrap();
        assert_eq!(status.sci, Sci::new(local(), 1));
        assert!(!status.transmitting);
        assert_eq!(status.encoding_sa, None);

        board.tx_sc_delete(id()).unwrap();
        assert!(matches!(
            board.tx_sc_status(id()),
            Err(MacsecError::NotFound { .. })
        ));
    }

    #[test]
    fn test_tx_sc_delete_wipes_sas() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        board.tx_sc_create(id()).unwrap();
        board
            .tx_sa_set(id(), AssocNum::AN1, 1, true, key(16))
            .unwrap();
        board.tx_sa_activate(id(), AssocNum::AN1).unwrap();

        board.tx_sc_delete(id()).unwrap();
        let sa = SaSlot::Tx {
            secy_slot: 0,
            an: AssocNum::AN1,
        };
        assert_eq!(sim.peek(PORT, sa.base()), 0);
        assert_eq!(sim.peek(PORT, sa.base().offset(regs::SA_KEY_WORD)), 0);
        assert!(matches!(
            board.tx_sa_get(id(), AssocNum::AN1),
            Err(MacsecError::NotFound { .. })
        ));
    }

    #[test]
    fn test_enciphering_sa_follows_confidentiality() {
        let (_sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        board.tx_sc_create(id()).unwrap();
        board.controlled_port_set(id(), true).unwrap();
        board
            .tx_sa_set(id(), AssocNum::AN0, 1, false, key(16))
            .unwrap();
        board.tx_sa_activate(id(), AssocNum::AN0).unwrap();

        let status = board.tx_sc_status(id()).unwrap();
        assert!(status.transmitting);
        assert_eq!(status.encoding_sa, Some(AssocNum::AN0));
        assert_eq!(status.enciphering_sa, None);
        assert!(status.started_time.is_some());
    }

    #[test]
    fn test_rx_sc_add_uses_free_slots() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        let first = Sci::new(peer(), 1);
        let second = Sci::new(peer(), 2);
        board.rx_sc_add(id(), first).unwrap();
        board.rx_sc_add(id(), second).unwrap();
        assert!(matches!(
            board.rx_sc_add(id(), first),
            Err(MacsecError::AlreadyExists { .. })
        ));

        let record: RxScRecord = sim.peek_record(PORT, regs::rx_sc_base(1));
        assert_eq!(record.sci, second);
        assert_eq!(record.secy_slot, 0);

        board.rx_sc_delete(id(), first).unwrap();
        assert_eq!(sim.peek(PORT, regs::rx_sc_base(0)), 0);
        let third = Sci::new(peer(), 3);
        board.rx_sc_add(id(), third).unwrap();
        let record: RxScRecord = sim.peek_record(PORT, regs::rx_sc_base(0));
        assert_eq!(record.sci, third);
    }

    #[test]
    fn test_rx_sc_slots_exhaust() {
        let (_sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        for port_id in 1..=4 {
            board.rx_sc_add(id(), Sci::new(peer(), port_id)).unwrap();
        }
        assert!(matches!(
            board.rx_sc_add(id(), Sci::new(peer(), 5)),
            Err(MacsecError::InvalidArgument { .. })
        ));
        assert!(!board.port_status_get(id()).unwrap().common.point_to_point);
    }

    #[test]
    fn test_rx_sc_update_and_enumerate() {
        let (_sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        let low = Sci::new(peer(), 1);
        let high = Sci::new(peer(), 9);
        board.rx_sc_add(id(), high).unwrap();
        board.rx_sc_add(id(), low).unwrap();

        assert_eq!(board.rx_sc_get_next(id(), None).unwrap(), low);
        assert_eq!(board.rx_sc_get_next(id(), Some(low)).unwrap(), high);
        assert!(matches!(
            board.rx_sc_get_next(id(), Some(high)),
            Err(MacsecError::NotFound { .. })
        ));

        let conf = RxScConf {
            validate_frames: ValidateFrames::Check,
            replay_protect: true,
            replay_window: 32,
            confidentiality_offset: 0,
        };
        board.rx_sc_update(id(), low, conf).unwrap();
        assert_eq!(board.rx_sc_get_conf(id(), low).unwrap(), conf);
        assert_eq!(
            board.rx_sc_get_conf(id(), high).unwrap(),
            RxScConf::from_secy(&secy_conf(CipherSuite::GcmAes128))
        );

        let status = board.rx_sc_status(id(), low).unwrap();
        assert!(!status.receiving);
        assert!(matches!(
            board.rx_sc_update(id(), Sci::new(peer(), 7), conf),
            Err(MacsecError::NotFound { .. })
        ));
    }
}
