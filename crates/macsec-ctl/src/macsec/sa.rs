//! Secure association lifecycle: key install, activation, packet numbers.
//!
//! An SA moves Configured -> Active -> Disabled and may be re-activated
//! from Disabled. Re-setting an active SA rekeys it in place and keeps it
//! active, provided the packet number does not move backwards. Only an SA
//! that is not active can be deleted.
//!
//! On the transmit side the most recently activated SA encodes; when it is
//! disabled or lost the next most recent active SA takes over.

use super::board::{MacsecBoard, PortHw, SOURCE};
use super::types::{
    RxSaInfo, SaEntry, SaState, SaStatus, SaTable, SecyEntry, SecyId, TxSaInfo, TxScEntry,
};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::{audit_log, debug_log, security_audit, warn_log};
use chrono::Utc;
use macsec_hal::regs::{SaRecord, SaSlot};
use macsec_hal::{MacsecError, MacsecResult};
use macsec_types::{AssocNum, PacketNumber, PnWidth, Sak, Sci, Ssci};

/// Parameters of one install request.
struct SaRequest {
    pn: PacketNumber,
    confidential: bool,
    key: Sak,
    ssci: Option<Ssci>,
}

impl SaRequest {
    /// Checks the request against the SecY cipher suite.
    fn check(&self, secy: &SecyEntry) -> MacsecResult<()> {
        let cipher = secy.conf.cipher_suite;
        if self.pn.width() != secy.pn_width() {
            return Err(MacsecError::invalid_argument(format!(
                "{} packet number on a {} SecY",
                self.pn.width(),
                cipher
            )));
        }
        if self.pn.is_zero() {
            return Err(MacsecError::invalid_argument("packet number must be non-zero"));
        }
        if self.key.key_len() != cipher.key_len() {
            return Err(MacsecError::invalid_argument(format!(
                "{}-byte key for {}",
                self.key.key_len(),
                cipher
            )));
        }
        if cipher.is_xpn() && (self.key.salt().is_none() || self.ssci.is_none()) {
            return Err(MacsecError::invalid_argument(format!(
                "{} needs a salt and an SSCI",
                cipher
            )));
        }
        Ok(())
    }
}

fn sa_not_found(what: &str, id: SecyId, an: AssocNum) -> MacsecError {
    MacsecError::not_found(format!("{} SA {} on SecY {}", what, an, id))
}

fn tx_sc_mut(id: SecyId, secy: &mut SecyEntry) -> MacsecResult<&mut TxScEntry> {
    secy.tx_sc
        .as_mut()
        .ok_or_else(|| MacsecError::not_found(format!("Tx SC on SecY {}", id)))
}

/// Loads the key and parameters into `sa` and records the SA in `table`.
///
/// An active SA stays active across the reload. When the hardware reports a
/// failure the driver has already wiped the entry, so the SA is dropped
/// from the table too.
fn load_sa(
    hw: &PortHw,
    sa: SaSlot,
    table: &mut SaTable,
    mut record: SaRecord,
    request: SaRequest,
) -> MacsecResult<()> {
    let previous = table
        .get(sa.an())
        .filter(|entry| entry.is_active())
        .map(|entry| (entry.started, entry.activated_seq));
    if previous.is_some() {
        let current = hw.driver.sa_pn_read(hw.port, sa)?;
        if request.pn.as_u64() < current {
            return Err(MacsecError::invalid_argument(format!(
                "packet number {} is behind the hardware value {} of active SA {}",
                request.pn,
                current,
                sa.an()
            )));
        }
    }
    record.active = previous.is_some();

    if let Err(err) = hw.driver.sa_install(hw.port, sa, &record, &request.key) {
        table.remove(sa.an());
        return Err(err);
    }

    let mut entry = SaEntry::new(request.key, request.ssci, request.confidential);
    if let Some((started, seq)) = previous {
        entry.state = SaState::Active;
        entry.started = started;
        entry.activated_seq = seq;
    }
    table.insert(sa.an(), entry);
    Ok(())
}

fn sa_status(entry: &SaEntry, in_use: bool, pn: PacketNumber) -> SaStatus {
    SaStatus {
        in_use,
        state: entry.state,
        pn,
        created_time: entry.created,
        started_time: entry.started,
        stopped_time: entry.stopped,
    }
}

impl MacsecBoard {
    /// Records the outcome of a key install: stats, and a security audit
    /// entry when the hardware refused the key.
    fn note_install(
        &self,
        action: &'static str,
        object: String,
        request: &AuditParams,
        result: &MacsecResult<()>,
    ) {
        let details = serde_json::json!({
            "pn": request.pn.as_u64(),
            "pn_width": request.pn.width(),
            "confidentiality": request.confidential,
            "key_len": request.key_len,
            "ssci": request.ssci.map(|ssci| ssci.to_u32()),
        });
        match result {
            Ok(_) => {
                self.bump(|s| s.sas_installed = s.sas_installed.saturating_add(1));
                audit_log!(
                    AuditRecord::new(AuditCategory::KeyManagement, SOURCE, action)
                        .with_outcome(AuditOutcome::Success)
                        .with_object_id(object)
                        .with_object_type("macsec_sa")
                        .with_details(details)
                );
            }
            Err(err) if err.status().is_some() || matches!(err, MacsecError::Timeout { .. }) => {
                self.bump(|s| s.key_installs_failed = s.key_installs_failed.saturating_add(1));
                security_audit!(
                    AuditRecord::new(AuditCategory::KeyManagement, SOURCE, action)
                        .with_outcome(AuditOutcome::Failure)
                        .with_object_id(object)
                        .with_object_type("macsec_sa")
                        .with_error(err.to_string())
                        .with_details(details)
                );
            }
            Err(err) => {
                audit_log!(
                    AuditRecord::new(AuditCategory::KeyManagement, SOURCE, action)
                        .with_outcome(AuditOutcome::Denied)
                        .with_object_id(object)
                        .with_object_type("macsec_sa")
                        .with_error(err.to_string())
                        .with_details(details)
                );
            }
        }
    }

    // Transmit

    /// Installs a transmit SA on a 32-bit PN SecY.
    pub fn tx_sa_set(
        &self,
        id: SecyId,
        an: AssocNum,
        next_pn: u32,
        confidentiality: bool,
        key: Sak,
    ) -> MacsecResult<()> {
        self.tx_sa_install(
            id,
            an,
            SaRequest {
                pn: PacketNumber::Pn(next_pn),
                confidential: confidentiality,
                key,
                ssci: None,
            },
        )
    }

    /// Installs a transmit SA on an XPN SecY. `key` must carry the salt.
    pub fn tx_sa_set_xpn(
        &self,
        id: SecyId,
        an: AssocNum,
        next_pn: u64,
        confidentiality: bool,
        key: Sak,
        ssci: Ssci,
    ) -> MacsecResult<()> {
        self.tx_sa_install(
            id,
            an,
            SaRequest {
                pn: PacketNumber::Xpn(next_pn),
                confidential: confidentiality,
                key,
                ssci: Some(ssci),
            },
        )
    }

    fn tx_sa_install(&self, id: SecyId, an: AssocNum, request: SaRequest) -> MacsecResult<()> {
        let params = AuditParams::from(&request);
        let result = self.with_secy(id, |hw, secy| {
            request.check(secy)?;
            let secy_slot = secy.slot;
            let xpn = secy.pn_width() == PnWidth::Xpn64;
            let tx = tx_sc_mut(id, secy)?;
            let record = SaRecord {
                active: false,
                confidential: request.confidential,
                xpn,
                replay_protect: false,
                replay_window: 0,
                pn: request.pn.as_u64(),
                ssci: request.ssci.map_or(0, |ssci| ssci.to_u32()),
            };
            let sa = SaSlot::Tx { secy_slot, an };
            let was_active = tx.sas.get(an).map_or(false, SaEntry::is_active);
            let result = load_sa(hw, sa, &mut tx.sas, record, request);
            if result.is_err() && was_active {
                let encoding = tx.encoding_an();
                if let Err(err) = hw.driver.encoding_sa_write(hw.port, secy_slot, encoding) {
                    warn_log!(SOURCE, secy = %id, error = %err, "failed to move encoding SA after install failure");
                }
                if encoding.is_none() {
                    tx.stopped = Some(Utc::now());
                }
            }
            result
        });
        self.note_install("tx_sa_set", format!("{}/tx/{}", id, an), &params, &result);
        result
    }

    /// Starts the SA; it becomes the encoding SA.
    pub fn tx_sa_activate(&self, id: SecyId, an: AssocNum) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            let secy_slot = secy.slot;
            let tx = tx_sc_mut(id, secy)?;
            let entry = tx.sas.get(an).ok_or_else(|| sa_not_found("Tx", id, an))?;
            if entry.is_active() {
                return Err(MacsecError::already_active(format!(
                    "Tx SA {} on SecY {}",
                    an, id
                )));
            }
            hw.driver
                .sa_active_write(hw.port, SaSlot::Tx { secy_slot, an }, true)?;

            let now = Utc::now();
            tx.activations += 1;
            let seq = tx.activations;
            if let Some(entry) = tx.sas.get_mut(an) {
                entry.state = SaState::Active;
                entry.activated_seq = seq;
                entry.started = Some(now);
            }
            hw.driver
                .encoding_sa_write(hw.port, secy_slot, tx.encoding_an())?;
            if tx.started.is_none() {
                tx.started = Some(now);
            }
            debug_log!(SOURCE, secy = %id, an = %an, "Tx SA active");
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::KeyManagement, SOURCE, "tx_sa_activate")
                .with_result(&result)
                .with_object_id(format!("{}/tx/{}", id, an))
                .with_object_type("macsec_sa")
        );
        result
    }

    /// Stops the SA. Encoding falls back to the most recently activated SA
    /// still active, if any.
    pub fn tx_sa_disable(&self, id: SecyId, an: AssocNum) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            let secy_slot = secy.slot;
            let tx = tx_sc_mut(id, secy)?;
            let entry = tx.sas.get(an).ok_or_else(|| sa_not_found("Tx", id, an))?;
            if !entry.is_active() {
                return Err(MacsecError::not_active(format!("Tx SA {} on SecY {}", an, id)));
            }
            hw.driver
                .sa_active_write(hw.port, SaSlot::Tx { secy_slot, an }, false)?;

            let now = Utc::now();
            if let Some(entry) = tx.sas.get_mut(an) {
                entry.state = SaState::Disabled;
                entry.stopped = Some(now);
            }
            let encoding = tx.encoding_an();
            hw.driver.encoding_sa_write(hw.port, secy_slot, encoding)?;
            if encoding.is_none() {
                tx.stopped = Some(now);
            }
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::KeyManagement, SOURCE, "tx_sa_disable")
                .with_result(&result)
                .with_object_id(format!("{}/tx/{}", id, an))
                .with_object_type("macsec_sa")
        );
        result
    }

    /// Wipes and forgets an SA that is not active.
    pub fn tx_sa_delete(&self, id: SecyId, an: AssocNum) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            let secy_slot = secy.slot;
            let tx = tx_sc_mut(id, secy)?;
            let entry = tx.sas.get(an).ok_or_else(|| sa_not_found("Tx", id, an))?;
            if entry.is_active() {
                return Err(MacsecError::already_active(format!(
                    "Tx SA {} on SecY {}",
                    an, id
                )));
            }
            hw.driver.sa_clear(hw.port, SaSlot::Tx { secy_slot, an })?;
            tx.sas.remove(an);
            Ok(())
        });
        if result.is_ok() {
            self.bump(|s| s.sas_deleted = s.sas_deleted.saturating_add(1));
        }

        audit_log!(
            AuditRecord::new(AuditCategory::KeyManagement, SOURCE, "tx_sa_delete")
                .with_result(&result)
                .with_object_id(format!("{}/tx/{}", id, an))
                .with_object_type("macsec_sa")
        );
        result
    }

    /// SA parameters with `next_pn` as currently held by the engine.
    pub fn tx_sa_get(&self, id: SecyId, an: AssocNum) -> MacsecResult<TxSaInfo> {
        self.with_secy(id, |hw, secy| {
            let secy_slot = secy.slot;
            let width = secy.pn_width();
            let tx = tx_sc_mut(id, secy)?;
            let entry = tx.sas.get(an).ok_or_else(|| sa_not_found("Tx", id, an))?;
            let pn = hw.driver.sa_pn_read(hw.port, SaSlot::Tx { secy_slot, an })?;
            Ok(TxSaInfo {
                next_pn: PacketNumber::from_raw(width, pn),
                confidentiality: entry.confidential,
                key: entry.key.clone(),
                active: entry.is_active(),
                ssci: entry.ssci,
            })
        })
    }

    pub fn tx_sa_status(&self, id: SecyId, an: AssocNum) -> MacsecResult<SaStatus> {
        self.with_secy(id, |hw, secy| {
            let secy_slot = secy.slot;
            let width = secy.pn_width();
            let tx = tx_sc_mut(id, secy)?;
            let entry = tx.sas.get(an).ok_or_else(|| sa_not_found("Tx", id, an))?;
            let pn = hw.driver.sa_pn_read(hw.port, SaSlot::Tx { secy_slot, an })?;
            Ok(sa_status(
                entry,
                tx.encoding_an() == Some(an),
                PacketNumber::from_raw(width, pn),
            ))
        })
    }

    // Receive

    /// Installs a receive SA on a 32-bit PN SecY.
    pub fn rx_sa_set(
        &self,
        id: SecyId,
        sci: Sci,
        an: AssocNum,
        lowest_pn: u32,
        key: Sak,
    ) -> MacsecResult<()> {
        self.rx_sa_install(
            id,
            sci,
            an,
            SaRequest {
                pn: PacketNumber::Pn(lowest_pn),
                confidential: false,
                key,
                ssci: None,
            },
        )
    }

    /// Installs a receive SA on an XPN SecY. `key` must carry the salt.
    pub fn rx_sa_set_xpn(
        &self,
        id: SecyId,
        sci: Sci,
        an: AssocNum,
        lowest_pn: u64,
        key: Sak,
        ssci: Ssci,
    ) -> MacsecResult<()> {
        self.rx_sa_install(
            id,
            sci,
            an,
            SaRequest {
                pn: PacketNumber::Xpn(lowest_pn),
                confidential: false,
                key,
                ssci: Some(ssci),
            },
        )
    }

    /// The SA takes the replay settings in effect for its channel now and
    /// keeps them until it is set again.
    fn rx_sa_install(
        &self,
        id: SecyId,
        sci: Sci,
        an: AssocNum,
        request: SaRequest,
    ) -> MacsecResult<()> {
        let params = AuditParams::from(&request);
        let result = self.with_secy(id, |hw, secy| {
            request.check(secy)?;
            let secy_conf = secy.conf;
            let xpn = secy.pn_width() == PnWidth::Xpn64;
            let rx = secy
                .rx_scs
                .get_mut(&sci)
                .ok_or_else(|| MacsecError::not_found(format!("Rx SC {} on SecY {}", sci, id)))?;
            let conf = rx.effective_conf(&secy_conf);
            let record = SaRecord {
                active: false,
                confidential: false,
                xpn,
                replay_protect: conf.replay_protect,
                replay_window: conf.replay_window,
                pn: request.pn.as_u64(),
                ssci: request.ssci.map_or(0, |ssci| ssci.to_u32()),
            };
            let sa = SaSlot::Rx {
                rx_slot: rx.rx_slot,
                an,
            };
            load_sa(hw, sa, &mut rx.sas, record, request)
        });
        self.note_install("rx_sa_set", format!("{}/rx/{}/{}", id, sci, an), &params, &result);
        result
    }

    pub fn rx_sa_activate(&self, id: SecyId, sci: Sci, an: AssocNum) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            let rx = secy
                .rx_scs
                .get_mut(&sci)
                .ok_or_else(|| MacsecError::not_found(format!("Rx SC {} on SecY {}", sci, id)))?;
            let rx_slot = rx.rx_slot;
            let entry = rx.sas.get_mut(an).ok_or_else(|| sa_not_found("Rx", id, an))?;
            if entry.is_active() {
                return Err(MacsecError::already_active(format!(
                    "Rx SA {} of {} on SecY {}",
                    an, sci, id
                )));
            }
            hw.driver
                .sa_active_write(hw.port, SaSlot::Rx { rx_slot, an }, true)?;
            let now = Utc::now();
            entry.state = SaState::Active;
            entry.started = Some(now);
            if rx.started.is_none() {
                rx.started = Some(now);
            }
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::KeyManagement, SOURCE, "rx_sa_activate")
                .with_result(&result)
                .with_object_id(format!("{}/rx/{}/{}", id, sci, an))
                .with_object_type("macsec_sa")
        );
        result
    }

    pub fn rx_sa_disable(&self, id: SecyId, sci: Sci, an: AssocNum) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            let rx = secy
                .rx_scs
                .get_mut(&sci)
                .ok_or_else(|| MacsecError::not_found(format!("Rx SC {} on SecY {}", sci, id)))?;
            let rx_slot = rx.rx_slot;
            let entry = rx.sas.get_mut(an).ok_or_else(|| sa_not_found("Rx", id, an))?;
            if !entry.is_active() {
                return Err(MacsecError::not_active(format!(
                    "Rx SA {} of {} on SecY {}",
                    an, sci, id
                )));
            }
            hw.driver
                .sa_active_write(hw.port, SaSlot::Rx { rx_slot, an }, false)?;
            let now = Utc::now();
            entry.state = SaState::Disabled;
            entry.stopped = Some(now);
            if !rx.sas.any_active() {
                rx.stopped = Some(now);
            }
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::KeyManagement, SOURCE, "rx_sa_disable")
                .with_result(&result)
                .with_object_id(format!("{}/rx/{}/{}", id, sci, an))
                .with_object_type("macsec_sa")
        );
        result
    }

    pub fn rx_sa_delete(&self, id: SecyId, sci: Sci, an: AssocNum) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            let rx = secy
                .rx_scs
                .get_mut(&sci)
                .ok_or_else(|| MacsecError::not_found(format!("Rx SC {} on SecY {}", sci, id)))?;
            let entry = rx.sas.get(an).ok_or_else(|| sa_not_found("Rx", id, an))?;
            if entry.is_active() {
                return Err(MacsecError::already_active(format!(
                    "Rx SA {} of {} on SecY {}",
                    an, sci, id
                )));
            }
            hw.driver.sa_clear(
                hw.port,
                SaSlot::Rx {
                    rx_slot: rx.rx_slot,
                    an,
                },
            )?;
            rx.sas.remove(an);
            Ok(())
        });
        if result.is_ok() {
            self.bump(|s| s.sas_deleted = s.sas_deleted.saturating_add(1));
        }

        audit_log!(
            AuditRecord::new(AuditCategory::KeyManagement, SOURCE, "rx_sa_delete")
                .with_result(&result)
                .with_object_id(format!("{}/rx/{}/{}", id, sci, an))
                .with_object_type("macsec_sa")
        );
        result
    }

    /// SA parameters with `lowest_pn` as currently held by the engine.
    pub fn rx_sa_get(&self, id: SecyId, sci: Sci, an: AssocNum) -> MacsecResult<RxSaInfo> {
        self.with_secy(id, |hw, secy| {
            let width = secy.pn_width();
            let rx = secy
                .rx_scs
                .get(&sci)
                .ok_or_else(|| MacsecError::not_found(format!("Rx SC {} on SecY {}", sci, id)))?;
            let entry = rx.sas.get(an).ok_or_else(|| sa_not_found("Rx", id, an))?;
            let pn = hw.driver.sa_pn_read(
                hw.port,
                SaSlot::Rx {
                    rx_slot: rx.rx_slot,
                    an,
                },
            )?;
            Ok(RxSaInfo {
                lowest_pn: PacketNumber::from_raw(width, pn),
                key: entry.key.clone(),
                active: entry.is_active(),
                ssci: entry.ssci,
            })
        })
    }

    pub fn rx_sa_status(&self, id: SecyId, sci: Sci, an: AssocNum) -> MacsecResult<SaStatus> {
        self.with_secy(id, |hw, secy| {
            let width = secy.pn_width();
            let rx = secy
                .rx_scs
                .get(&sci)
                .ok_or_else(|| MacsecError::not_found(format!("Rx SC {} on SecY {}", sci, id)))?;
            let entry = rx.sas.get(an).ok_or_else(|| sa_not_found("Rx", id, an))?;
            let pn = hw.driver.sa_pn_read(
                hw.port,
                SaSlot::Rx {
                    rx_slot: rx.rx_slot,
                    an,
                },
            )?;
            Ok(sa_status(
                entry,
                entry.is_active(),
                PacketNumber::from_raw(width, pn),
            ))
        })
    }

    /// Moves the replay floor of a receive SA. On an active SA the floor
    /// can only move forward.
    pub fn rx_sa_lowest_pn_update(
        &self,
        id: SecyId,
        sci: Sci,
        an: AssocNum,
        lowest_pn: PacketNumber,
    ) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            if lowest_pn.width() != secy.pn_width() {
                return Err(MacsecError::invalid_argument(format!(
                    "{} packet number on a {} SecY",
                    lowest_pn.width(),
                    secy.conf.cipher_suite
                )));
            }
            if lowest_pn.is_zero() {
                return Err(MacsecError::invalid_argument("packet number must be non-zero"));
            }
            let rx = secy
                .rx_scs
                .get(&sci)
                .ok_or_else(|| MacsecError::not_found(format!("Rx SC {} on SecY {}", sci, id)))?;
            let entry = rx.sas.get(an).ok_or_else(|| sa_not_found("Rx", id, an))?;
            let sa = SaSlot::Rx {
                rx_slot: rx.rx_slot,
                an,
            };
            if entry.is_active() {
                let current = hw.driver.sa_pn_read(hw.port, sa)?;
                if lowest_pn.as_u64() < current {
                    return Err(MacsecError::invalid_argument(format!(
                        "lowest PN {} is behind the hardware value {}",
                        lowest_pn, current
                    )));
                }
            }
            hw.driver.sa_pn_write(hw.port, sa, lowest_pn.as_u64())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::KeyManagement, SOURCE, "rx_sa_lowest_pn_update")
                .with_result(&result)
                .with_object_id(format!("{}/rx/{}/{}", id, sci, an))
                .with_object_type("macsec_sa")
                .with_details(serde_json::json!({ "lowest_pn": lowest_pn.as_u64() }))
        );
        result
    }
}

/// Key-free summary of an install request for the audit trail.
struct AuditParams {
    pn: PacketNumber,
    confidential: bool,
    key_len: usize,
    ssci: Option<Ssci>,
}

impl From<&SaRequest> for AuditParams {
    fn from(request: &SaRequest) -> Self {
        AuditParams {
            pn: request.pn,
            confidential: request.confidential,
            key_len: request.key.key_len(),
            ssci: request.ssci,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::macsec::test_support::*;
    use crate::macsec::SaState;
    use macsec_hal::regs::{self, SaRecord, SaSlot};
    use macsec_hal::{MacsecError, PhyFamily, PhyStatus, RxScConf, ValidateFrames};
    use macsec_types::{AssocNum, CipherSuite, PacketNumber, Sci, Ssci};
    use pretty_assertions::assert_eq;

    const TX0: SaSlot = SaSlot::Tx {
        secy_slot: 0,
        an: AssocNum::AN0,
    };

    fn encoding(sim: &macsec_sim::SimPhy) -> Option<AssocNum> {
        regs::decode_encoding_sa(sim.peek(PORT, regs::secy_base(0).add(regs::SECY_ENCODING_SA_WORD)))
    }

    #[test]
    fn test_tx_sa_install_and_get() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes256);
        board.tx_sc_create(id()).unwrap();
        board
            .tx_sa_set(id(), AssocNum::AN0, 7, true, key(32))
            .unwrap();

        let info = board.tx_sa_get(id(), AssocNum::AN0).unwrap();
        assert_eq!(info.next_pn, PacketNumber::Pn(7));
        assert!(info.confidentiality);
        assert!(!info.active);
        assert_eq!(info.key, key(32));
        assert_eq!(info.ssci, None);

        let record: SaRecord = sim.peek_record(PORT, TX0.base());
        assert!(record.confidential);
        assert!(!record.xpn);
        assert_eq!(record.pn, 7);
        assert_eq!(board.stats().sas_installed, 1);

        let status = board.tx_sa_status(id(), AssocNum::AN0).unwrap();
        assert_eq!(status.state, SaState::Configured);
        assert!(!status.in_use);
    }

    #[test]
    fn test_tx_sa_needs_tx_sc() {
        let (_sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        assert!(matches!(
            board.tx_sa_set(id(), AssocNum::AN0, 1, true, key(16)),
            Err(MacsecError::NotFound { .. })
        ));
    }

    #[test]
    fn test_install_argument_checks() {
        let (_sim, board) = with_secy(PhyFamily::Malibu25g, CipherSuite::GcmAes128);
        board.tx_sc_create(id()).unwrap();
        // zero PN
        assert!(matches!(
            board.tx_sa_set(id(), AssocNum::AN0, 0, true, key(16)),
            Err(MacsecError::InvalidArgument { .. })
        ));
        // key length does not fit the cipher suite
        assert!(matches!(
            board.tx_sa_set(id(), AssocNum::AN0, 1, true, key(32)),
            Err(MacsecError::InvalidArgument { .. })
        ));
        // XPN request on a PN SecY
        assert!(matches!(
            board.tx_sa_set_xpn(id(), AssocNum::AN0, 1, true, xpn_key(16), Ssci::from_u32(1)),
            Err(MacsecError::InvalidArgument { .. })
        ));
        assert!(matches!(
            board.tx_sa_get(id(), AssocNum::AN0),
            Err(MacsecError::NotFound { .. })
        ));
        assert_eq!(board.stats().key_installs_failed, 0);
    }

    #[test]
    fn test_xpn_sa_needs_salt() {
        let (sim, board) = with_secy(PhyFamily::Malibu25g, CipherSuite::GcmAesXpn256);
        board.tx_sc_create(id()).unwrap();
        assert!(matches!(
            board.tx_sa_set_xpn(id(), AssocNum::AN1, 1, true, key(32), Ssci::from_u32(9)),
            Err(MacsecError::InvalidArgument { .. })
        ));

        let next_pn = 0x1_0000_0005;
        board
            .tx_sa_set_xpn(id(), AssocNum::AN1, next_pn, true, xpn_key(32), Ssci::from_u32(9))
            .unwrap();
        let info = board.tx_sa_get(id(), AssocNum::AN1).unwrap();
        assert_eq!(info.next_pn, PacketNumber::Xpn(next_pn));
        assert_eq!(info.ssci, Some(Ssci::from_u32(9)));

        let record: SaRecord = sim.peek_record(
            PORT,
            SaSlot::Tx {
                secy_slot: 0,
                an: AssocNum::AN1,
            }
            .base(),
        );
        assert!(record.xpn);
        assert_eq!(record.ssci, 9);
        assert_eq!(record.pn, next_pn);
    }

    #[test]
    fn test_activate_disable_and_encoding_fallback() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        board.tx_sc_create(id()).unwrap();
        board
            .tx_sa_set(id(), AssocNum::AN0, 1, true, key(16))
            .unwrap();
        board
            .tx_sa_set(id(), AssocNum::AN1, 1, true, key(16))
            .unwrap();
        assert!(matches!(
            board.tx_sa_disable(id(), AssocNum::AN0),
            Err(MacsecError::NotActive { .. })
        ));

        board.tx_sa_activate(id(), AssocNum::AN0).unwrap();
        assert!(matches!(
            board.tx_sa_activate(id(), AssocNum::AN0),
            Err(MacsecError::AlreadyActive { .. })
        ));
        board.tx_sa_activate(id(), AssocNum::AN1).unwrap();
        assert_eq!(encoding(&sim), Some(AssocNum::AN1));
        assert!(board.tx_sa_status(id(), AssocNum::AN1).unwrap().in_use);
        assert!(!board.tx_sa_status(id(), AssocNum::AN0).unwrap().in_use);

        board.tx_sa_disable(id(), AssocNum::AN1).unwrap();
        assert_eq!(encoding(&sim), Some(AssocNum::AN0));
        assert_eq!(
            board.tx_sa_status(id(), AssocNum::AN1).unwrap().state,
            SaState::Disabled
        );

        board.tx_sa_disable(id(), AssocNum::AN0).unwrap();
        assert_eq!(encoding(&sim), None);
        let status = board.tx_sc_status(id()).unwrap();
        assert_eq!(status.encoding_sa, None);
        assert!(status.stopped_time.is_some());

        // disabled SAs can be started again
        board.tx_sa_activate(id(), AssocNum::AN1).unwrap();
        assert_eq!(encoding(&sim), Some(AssocNum::AN1));
    }

    #[test]
    fn test_delete_refuses_active_sa() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        board.tx_sc_create(id()).unwrap();
        board
            .tx_sa_set(id(), AssocNum::AN0, 1, true, key(16))
            .unwrap();
        board.tx_sa_activate(id(), AssocNum::AN0).unwrap();
        assert!(matches!(
            board.tx_sa_delete(id(), AssocNum::AN0),
            Err(MacsecError::AlreadyActive { .. })
        ));

        board.tx_sa_disable(id(), AssocNum::AN0).unwrap();
        board.tx_sa_delete(id(), AssocNum::AN0).unwrap();
        assert_eq!(sim.peek(PORT, TX0.base()), 0);
        assert_eq!(sim.peek(PORT, TX0.base().offset(regs::SA_KEY_WORD)), 0);
        assert_eq!(board.stats().sas_deleted, 1);
    }

    #[test]
    fn test_rekey_active_sa_in_place() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        board.tx_sc_create(id()).unwrap();
        board
            .tx_sa_set(id(), AssocNum::AN0, 100, true, key(16))
            .unwrap();
        board.tx_sa_activate(id(), AssocNum::AN0).unwrap();

        assert!(matches!(
            board.tx_sa_set(id(), AssocNum::AN0, 50, true, key(16)),
            Err(MacsecError::InvalidArgument { .. })
        ));
        board
            .tx_sa_set(id(), AssocNum::AN0, 200, true, key(16))
            .unwrap();
        assert!(board.tx_sa_get(id(), AssocNum::AN0).unwrap().active);
        let record: SaRecord = sim.peek_record(PORT, TX0.base());
        assert!(record.active);
        assert_eq!(record.pn, 200);
        assert_eq!(encoding(&sim), Some(AssocNum::AN0));
    }

    #[test]
    fn test_install_timeout_drops_sa() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        board.tx_sc_create(id()).unwrap();
        sim.hang_key_install(true);
        assert!(matches!(
            board.tx_sa_set(id(), AssocNum::AN2, 1, true, key(16)),
            Err(MacsecError::Timeout { .. })
        ));
        sim.hang_key_install(false);

        let slot = SaSlot::Tx {
            secy_slot: 0,
            an: AssocNum::AN2,
        };
        assert_eq!(sim.peek(PORT, slot.base().offset(regs::SA_KEY_WORD)), 0);
        assert!(matches!(
            board.tx_sa_get(id(), AssocNum::AN2),
            Err(MacsecError::NotFound { .. })
        ));
        assert_eq!(board.stats().key_installs_failed, 1);
        assert_eq!(board.stats().sas_installed, 0);
    }

    #[test]
    fn test_failed_rekey_moves_encoding() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        board.tx_sc_create(id()).unwrap();
        for an in [AssocNum::AN0, AssocNum::AN1] {
            board.tx_sa_set(id(), an, 1, true, key(16)).unwrap();
            board.tx_sa_activate(id(), an).unwrap();
        }
        assert_eq!(encoding(&sim), Some(AssocNum::AN1));

        sim.hang_key_install(true);
        assert!(board
            .tx_sa_set(id(), AssocNum::AN1, 10, true, key(16))
            .is_err());
        sim.hang_key_install(false);
        assert_eq!(encoding(&sim), Some(AssocNum::AN0));
        assert_eq!(
            board.tx_sc_status(id()).unwrap().encoding_sa,
            Some(AssocNum::AN0)
        );
    }

    #[test]
    fn test_hardware_failure_counts_as_install_failure() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        board.tx_sc_create(id()).unwrap();
        sim.fail_after(2, PhyStatus::Error);
        assert!(board
            .tx_sa_set(id(), AssocNum::AN0, 1, true, key(16))
            .is_err());
        sim.clear_faults();
        assert_eq!(board.stats().key_installs_failed, 1);
        assert!(board.tx_sa_get(id(), AssocNum::AN0).is_err());
    }

    #[test]
    fn test_rx_sa_lifecycle() {
        let (sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        let sci = Sci::new(peer(), 1);
        board.rx_sc_add(id(), sci).unwrap();
        board
            .rx_sc_update(
                id(),
                sci,
                RxScConf {
                    validate_frames: ValidateFrames::Strict,
                    replay_protect: true,
                    replay_window: 16,
                    confidentiality_offset: 0,
                },
            )
            .unwrap();
        board
            .rx_sa_set(id(), sci, AssocNum::AN3, 5, key(16))
            .unwrap();
        let slot = SaSlot::Rx {
            rx_slot: 0,
            an: AssocNum::AN3,
        };
        let record: SaRecord = sim.peek_record(PORT, slot.base());
        assert!(record.replay_protect);
        assert_eq!(record.replay_window, 16);

        board.rx_sa_activate(id(), sci, AssocNum::AN3).unwrap();
        assert!(board.rx_sc_status(id(), sci).unwrap().receiving);
        assert!(board.rx_sa_status(id(), sci, AssocNum::AN3).unwrap().in_use);
        assert!(matches!(
            board.rx_sa_delete(id(), sci, AssocNum::AN3),
            Err(MacsecError::AlreadyActive { .. })
        ));

        let info = board.rx_sa_get(id(), sci, AssocNum::AN3).unwrap();
        assert_eq!(info.lowest_pn, PacketNumber::Pn(5));
        assert!(info.active);

        board.rx_sa_disable(id(), sci, AssocNum::AN3).unwrap();
        let status = board.rx_sc_status(id(), sci).unwrap();
        assert!(!status.receiving);
        assert!(status.stopped_time.is_some());
        board.rx_sa_delete(id(), sci, AssocNum::AN3).unwrap();
        assert_eq!(sim.peek(PORT, slot.base()), 0);
    }

    #[test]
    fn test_lowest_pn_update() {
        let (_sim, board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes128);
        let sci = Sci::new(peer(), 1);
        board.rx_sc_add(id(), sci).unwrap();
        board
            .rx_sa_set(id(), sci, AssocNum::AN0, 10, key(16))
            .unwrap();
        board.rx_sa_activate(id(), sci, AssocNum::AN0).unwrap();

        board
            .rx_sa_lowest_pn_update(id(), sci, AssocNum::AN0, PacketNumber::Pn(20))
            .unwrap();
        assert_eq!(
            board.rx_sa_get(id(), sci, AssocNum::AN0).unwrap().lowest_pn,
            PacketNumber::Pn(20)
        );
        assert!(matches!(
            board.rx_sa_lowest_pn_update(id(), sci, AssocNum::AN0, PacketNumber::Pn(15)),
            Err(MacsecError::InvalidArgument { .. })
        ));
        assert!(matches!(
            board.rx_sa_lowest_pn_update(id(), sci, AssocNum::AN0, PacketNumber::Xpn(30)),
            Err(MacsecError::InvalidArgument { .. })
        ));
        assert!(matches!(
            board.rx_sa_lowest_pn_update(id(), sci, AssocNum::AN1, PacketNumber::Pn(30)),
            Err(MacsecError::NotFound { .. })
        ));
    }
}
