//! SecY registry: create, update, delete, controlled port and status.

use super::board::{MacsecBoard, PortEntry, PortHw, SOURCE};
use super::channel::{teardown_rx_sc, teardown_tx_sc};
use super::types::{PortStatus, PortStatusEntry, SecyEntry, SecyId, TxScEntry};
use crate::audit::{AuditCategory, AuditRecord};
use crate::{audit_log, debug_log};
use macsec_hal::regs::{RxScRecord, SecyRecord};
use macsec_hal::{
    BypassMode, MacsecError, MacsecResult, PortNo, RxScConf, SecyConf, TagBypass, TxScConf,
};
use macsec_types::Sci;
use std::ops::Bound;

impl MacsecBoard {
    /// Creates a SecY in the lowest free hardware slot. The controlled port
    /// starts disabled.
    pub fn secy_create(&self, id: SecyId, conf: SecyConf) -> MacsecResult<()> {
        let result = self.with_engine(id.port, |entry| {
            if entry.secys.contains_key(&id) {
                return Err(MacsecError::already_exists(format!("SecY {}", id)));
            }
            conf.validate()?;
            if conf.cipher_suite.is_xpn() && !entry.hw.caps().xpn {
                return Err(MacsecError::not_implemented(format!(
                    "{} on {}",
                    conf.cipher_suite, entry.hw.info.family
                )));
            }
            let slot = entry.free_secy_slot()?;
            entry.hw.driver.secy_write(
                id.port,
                slot,
                &SecyRecord {
                    conf,
                    port_id: id.port_id,
                    controlled: false,
                },
            )?;
            entry.secys.insert(id, SecyEntry::new(slot, conf));
            Ok(slot)
        });
        if result.is_ok() {
            self.bump(|s| s.secys_created = s.secys_created.saturating_add(1));
        }

        audit_log!(
            AuditRecord::new(AuditCategory::ResourceCreate, SOURCE, "secy_create")
                .with_result(&result)
                .with_object_id(id.to_string())
                .with_object_type("macsec_secy")
                .with_details(serde_json::json!({
                    "slot": result.as_ref().ok(),
                    "mac_addr": conf.mac_addr.to_string(),
                    "cipher_suite": conf.cipher_suite,
                    "validate_frames": conf.validate_frames,
                    "protect_frames": conf.protect_frames,
                }))
        );
        result.map(|_| ())
    }

    /// Rewrites the SecY configuration.
    ///
    /// Channels without their own override follow the new defaults. SAs
    /// already installed keep the replay settings they were installed with.
    /// Switching between PN and XPN suites is refused while any SA exists.
    pub fn secy_update(&self, id: SecyId, conf: SecyConf) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            conf.validate()?;
            if conf.cipher_suite.is_xpn() && !hw.caps().xpn {
                return Err(MacsecError::not_implemented(format!(
                    "{} on {}",
                    conf.cipher_suite, hw.info.family
                )));
            }
            if conf.cipher_suite.pn_width() != secy.pn_width() && secy.has_sas() {
                return Err(MacsecError::invalid_argument(format!(
                    "SecY {} has SAs; cannot switch {} to {}",
                    id,
                    secy.conf.cipher_suite,
                    conf.cipher_suite
                )));
            }
            hw.driver.secy_write(
                hw.port,
                secy.slot,
                &SecyRecord {
                    conf,
                    port_id: id.port_id,
                    controlled: secy.controlled,
                },
            )?;
            secy.conf = conf;

            if secy.tx_sc.as_ref().map_or(false, |tx| tx.conf.is_none()) {
                hw.driver
                    .tx_sc_write(hw.port, secy.slot, &TxScConf::from_secy(&conf))?;
            }
            for (sci, rx) in secy.rx_scs.iter().filter(|(_, rx)| rx.conf.is_none()) {
                hw.driver.rx_sc_write(
                    hw.port,
                    rx.rx_slot,
                    &RxScRecord {
                        secy_slot: secy.slot,
                        sci: *sci,
                        conf: RxScConf::from_secy(&conf),
                    },
                )?;
            }
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::ResourceModify, SOURCE, "secy_update")
                .with_result(&result)
                .with_object_id(id.to_string())
                .with_object_type("macsec_secy")
                .with_details(serde_json::json!({
                    "cipher_suite": conf.cipher_suite,
                    "replay_protect": conf.replay_protect,
                    "replay_window": conf.replay_window,
                }))
        );
        result
    }

    pub fn secy_get(&self, id: SecyId) -> MacsecResult<SecyConf> {
        self.with_secy(id, |_, secy| Ok(secy.conf))
    }

    /// Deletes the SecY together with its channels, SAs and rules.
    pub fn secy_delete(&self, id: SecyId) -> MacsecResult<()> {
        let result = self.with_engine(id.port, |entry| {
            let PortEntry { hw, secys, .. } = entry;
            let secy = secys
                .get_mut(&id)
                .ok_or_else(|| MacsecError::not_found(format!("SecY {}", id)))?;
            teardown_secy(hw, id, secy)?;
            secys.remove(&id);
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::ResourceDelete, SOURCE, "secy_delete")
                .with_result(&result)
                .with_object_id(id.to_string())
                .with_object_type("macsec_secy")
        );
        result
    }

    /// SecY enumeration in handle order. `None` starts from the first.
    pub fn secy_get_next(&self, port: PortNo, after: Option<SecyId>) -> MacsecResult<SecyId> {
        self.with_engine(port, |entry| {
            let next = match after {
                None => entry.secys.keys().next(),
                Some(after) => entry
                    .secys
                    .range((Bound::Excluded(after), Bound::Unbounded))
                    .map(|(id, _)| id)
                    .next(),
            };
            next.copied()
                .ok_or_else(|| MacsecError::not_found(format!("SecY after {:?} on port {}", after, port)))
        })
    }

    pub fn controlled_port_set(&self, id: SecyId, enable: bool) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            hw.driver.controlled_port_write(hw.port, secy.slot, enable)?;
            secy.controlled = enable;
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::SecurityPolicy, SOURCE, "controlled_port_set")
                .with_result(&result)
                .with_object_id(id.to_string())
                .with_object_type("macsec_secy")
                .with_details(serde_json::json!({ "enable": enable }))
        );
        result
    }

    pub fn controlled_port_get(&self, id: SecyId) -> MacsecResult<bool> {
        self.with_secy(id, |_, secy| Ok(secy.controlled))
    }

    /// Selects which VLAN tags of protected frames stay in clear ahead of
    /// the SecTAG.
    pub fn bypass_tag_set(&self, id: SecyId, bypass: TagBypass) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            hw.driver.tag_bypass_write(hw.port, secy.slot, bypass)
        });

        audit_log!(
            AuditRecord::new(AuditCategory::SecurityPolicy, SOURCE, "bypass_tag_set")
                .with_result(&result)
                .with_object_id(id.to_string())
                .with_object_type("macsec_secy")
                .with_details(serde_json::json!({ "bypass": bypass }))
        );
        result
    }

    pub fn bypass_tag_get(&self, id: SecyId) -> MacsecResult<TagBypass> {
        self.with_secy(id, |hw, secy| hw.driver.tag_bypass_read(hw.port, secy.slot))
    }

    /// 802.1AE port status derived from the engine state and the registry.
    ///
    /// The controlled port is operational when enabled, the engine is not
    /// bypassed, and, if frames must be protected, an SA is encoding.
    pub fn port_status_get(&self, id: SecyId) -> MacsecResult<PortStatus> {
        self.with_engine(id.port, |entry| {
            let operational = entry.init.bypass != BypassMode::Enable;
            let secy = entry.secy(id)?;
            let point_to_point = secy.rx_scs.len() <= 1;
            let common = PortStatusEntry {
                mac_enabled: true,
                mac_operational: operational,
                point_to_point,
            };
            let protect = secy
                .tx_sc
                .as_ref()
                .map_or(secy.conf.protect_frames, |tx| {
                    tx.effective_conf(&secy.conf).protect_frames
                });
            let transmitting = secy
                .tx_sc
                .as_ref()
                .and_then(TxScEntry::encoding_an)
                .is_some();
            Ok(PortStatus {
                controlled: PortStatusEntry {
                    mac_enabled: secy.controlled,
                    mac_operational: secy.controlled && operational && (!protect || transmitting),
                    point_to_point,
                },
                uncontrolled: common,
                common,
            })
        })
    }
}

/// Clears every hardware object of a SecY, children first. Registry entries
/// are dropped as their hardware goes, so a failure leaves the rest
/// reachable for another attempt.
pub(crate) fn teardown_secy(hw: &PortHw, id: SecyId, secy: &mut SecyEntry) -> MacsecResult<()> {
    let scis: Vec<Sci> = secy.rx_scs.keys().copied().collect();
    for sci in scis {
        if let Some(rx) = secy.rx_scs.get_mut(&sci) {
            teardown_rx_sc(hw, rx)?;
        }
        secy.rx_scs.remove(&sci);
    }
    if let Some(tx) = secy.tx_sc.as_mut() {
        teardown_tx_sc(hw, secy.slot, tx)?;
    }
    secy.tx_sc = None;

    let rules: Vec<_> = secy.patterns.keys().copied().collect();
    for (direction, action) in rules {
        hw.driver.rule_clear(hw.port, secy.slot, direction, action)?;
        secy.patterns.remove(&(direction, action));
    }
    hw.driver.secy_clear(hw.port, secy.slot)?;
    debug_log!(SOURCE, secy = %id, slot = secy.slot, "SecY cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macsec::test_support::*;
    use macsec_hal::regs;
    use macsec_hal::{PhyFamily, ValidateFrames};
    use macsec_types::{AssocNum, CipherSuite};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_requires_enabled_engine() {
        let (_sim, board) = attached(PhyFamily::Viper);
        assert_eq!(
            board.secy_create(id(), secy_conf(CipherSuite::GcmAes128)),
            Err(MacsecError::EngineNotEnabled { port: 3 })
        );
    }

    #[test]
    fn test_create_get_and_duplicate() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes256);
        assert_eq!(
            board.secy_get(id()).unwrap(),
            secy_conf(CipherSuite::GcmAes256)
        );
        assert!(matches!(
            board.secy_create(id(), secy_conf(CipherSuite::GcmAes256)),
            Err(MacsecError::AlreadyExists { .. })
        ));
        let record: SecyRecord = sim.peek_record(PORT, regs::secy_base(0));
        assert_eq!(record.port_id, 1);
        assert!(!record.controlled);
        assert!(!board.controlled_port_get(id()).unwrap());
        assert_eq!(board.stats().secys_created, 1);
    }

    #[test]
    fn test_invalid_conf_rejected() {
        let (_sim, board) = attached(PhyFamily::Viper);
        board.engine_init(PORT, true, BypassMode::Disable).unwrap();
        let mut conf = secy_conf(CipherSuite::GcmAes128);
        conf.confidentiality_offset = 65;
        assert!(matches!(
            board.secy_create(id(), conf),
            Err(MacsecError::InvalidArgument { .. })
        ));
        assert!(matches!(
            board.secy_get(id()),
            Err(MacsecError::NotFound { .. })
        ));
    }

    #[test]
    fn test_xpn_needs_xpn_family() {
        let (_sim, board) = attached(PhyFamily::Viper);
        board.engine_init(PORT, true, BypassMode::Disable).unwrap();
        assert!(board
            .secy_create(id(), secy_conf(CipherSuite::GcmAesXpn256))
            .unwrap_err()
            .is_not_implemented());

        let (_sim, board) = with_secy(PhyFamily::Malibu25g, CipherSuite::GcmAesXpn256);
        assert_eq!(
            board.secy_get(id()).unwrap().cipher_suite,
            CipherSuite::GcmAesXpn256
        );
    }

    #[test]
    fn test_slot_exhaustion() {
        let (_sim, board) = with_secy(PhyFamily::Indy, CipherSuite::GcmAes128);
        let second = SecyId::new(PORT, 1, 2);
        assert!(matches!(
            board.secy_create(second, secy_conf(CipherSuite::GcmAes128)),
            Err(MacsecError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_enumeration_order() {
        let (_sim, board) = with_secy(PhyFamily::Malibu25g, CipherSuite::GcmAes128);
        let second = SecyId::new(PORT, 1, 2);
        board
            .secy_create(second, secy_conf(CipherSuite::GcmAes128))
            .unwrap();

        assert_eq!(board.secy_get_next(PORT, None).unwrap(), id());
        assert_eq!(board.secy_get_next(PORT, Some(id())).unwrap(), second);
        assert!(matches!(
            board.secy_get_next(PORT, Some(second)),
            Err(MacsecError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_keeps_existing_sa_replay_snapshot() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        let sci = Sci::new(peer(), 1);
        board.rx_sc_add(id(), sci).unwrap();
        board
            .rx_sa_set(id(), sci, AssocNum::AN0, 1, key(16))
            .unwrap();

        let mut conf = secy_conf(CipherSuite::GcmAes256);
        conf.replay_protect = true;
        conf.replay_window = 64;
        conf.validate_frames = ValidateFrames::Check;
        board.secy_update(id(), conf).unwrap();

        assert_eq!(board.rx_sc_get_conf(id(), sci).unwrap().replay_window, 64);
        let sa: regs::SaRecord = sim.peek_record(
            PORT,
            regs::SaSlot::Rx {
                rx_slot: 0,
                an: AssocNum::AN0,
            }
            .base(),
        );
        assert!(!sa.replay_protect);
        assert_eq!(sa.replay_window, 0);
    }

    #[test]
    fn test_update_refuses_width_change_with_sas() {
        let (_sim, board) = with_secy(PhyFamily::Malibu25g, CipherSuite::GcmAes128);
        board.tx_sc_create(id()).unwrap();
        board
            .tx_sa_set(id(), AssocNum::AN0, 1, false, key(16))
            .unwrap();
        assert!(matches!(
            board.secy_update(id(), secy_conf(CipherSuite::GcmAesXpn128)),
            Err(MacsecError::InvalidArgument { .. })
        ));

        board.tx_sa_delete(id(), AssocNum::AN0).unwrap();
        board
            .secy_update(id(), secy_conf(CipherSuite::GcmAesXpn128))
            .unwrap();
    }

    #[test]
    fn test_controlled_port_gate() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        board.controlled_port_set(id(), true).unwrap();
        assert!(board.controlled_port_get(id()).unwrap());
        let record: SecyRecord = sim.peek_record(PORT, regs::secy_base(0));
        assert!(record.controlled);
    }

    #[test]
    fn test_port_status() {
        let (_sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        let status = board.port_status_get(id()).unwrap();
        assert!(status.common.mac_operational);
        assert!(status.uncontrolled.mac_operational);
        assert!(!status.controlled.mac_enabled);

        board.controlled_port_set(id(), true).unwrap();
        board.tx_sc_create(id()).unwrap();
        // protect_frames with no encoding SA
        assert!(!board.port_status_get(id()).unwrap().controlled.mac_operational);

        board
            .tx_sa_set(id(), AssocNum::AN2, 1, true, key(16))
            .unwrap();
        board.tx_sa_activate(id(), AssocNum::AN2).unwrap();
        let status = board.port_status_get(id()).unwrap();
        assert!(status.controlled.mac_operational);
        assert!(status.controlled.point_to_point);
    }

    #[test]
    fn test_engine_off_keeps_registry() {
        let (_sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        board.engine_init(PORT, false, BypassMode::None).unwrap();
        assert_eq!(
            board.secy_get(id()),
            Err(MacsecError::EngineNotEnabled { port: 3 })
        );
        assert_eq!(
            board.secy_delete(id()),
            Err(MacsecError::EngineNotEnabled { port: 3 })
        );
        board.engine_init(PORT, true, BypassMode::None).unwrap();
        assert!(board.secy_get(id()).is_ok());
    }

    #[test]
    fn test_delete_then_recreate_reuses_slot() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        board
            .pattern_set(
                id(),
                macsec_hal::Direction::Egress,
                macsec_hal::MatchAction::ControlledPort,
                macsec_hal::MatchPattern::default(),
            )
            .unwrap();
        board.secy_delete(id()).unwrap();
        assert_eq!(sim.peek(PORT, regs::secy_base(0)), 0);
        assert_eq!(
            sim.peek(
                PORT,
                regs::rule_base(
                    0,
                    macsec_hal::Direction::Egress,
                    macsec_hal::MatchAction::ControlledPort
                )
            ),
            0
        );
        board
            .secy_create(id(), secy_conf(CipherSuite::GcmAes128))
            .unwrap();
        let record: SecyRecord = sim.peek_record(PORT, regs::secy_base(0));
        assert_eq!(record.conf.mac_addr, local());
    }

    #[test]
    fn test_bypass_tag_round_trip() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        assert_eq!(board.bypass_tag_get(id()).unwrap(), TagBypass::None);
        board.bypass_tag_set(id(), TagBypass::Tag).unwrap();
        assert_eq!(board.bypass_tag_get(id()).unwrap(), TagBypass::Tag);
        assert_eq!(
            sim.peek(PORT, regs::secy_base(0).add(regs::SECY_TAG_BYPASS_WORD)),
            TagBypass::Tag.to_raw()
        );

        let unknown = SecyId::new(PORT, 0, 9);
        assert!(matches!(
            board.bypass_tag_set(unknown, TagBypass::Header),
            Err(MacsecError::NotFound { .. })
        ));

        // a deleted SecY leaves no tag bypass behind for the next one
        board.secy_delete(id()).unwrap();
        board
            .secy_create(id(), secy_conf(CipherSuite::GcmAes128))
            .unwrap();
        assert_eq!(board.bypass_tag_get(id()).unwrap(), TagBypass::None);
    }
}
