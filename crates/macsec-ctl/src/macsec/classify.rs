//! Classification: per-SecY match rules, the port default policy and
//! control-frame rules.

use super::board::{MacsecBoard, SOURCE};
use super::types::{Resolution, SecyId};
use crate::audit::{AuditCategory, AuditRecord};
use crate::{audit_log, debug_log};
use macsec_hal::classify::{is_control_frame, resolve};
use macsec_hal::{
    BypassMode, ControlFrameMatch, DefaultAction, DefaultActionPolicy, Direction, Frame,
    MacsecError, MacsecResult, MatchAction, MatchPattern, PortNo,
};

impl MacsecBoard {
    /// Installs or replaces the rule steering matching frames of `direction`
    /// to `action` on this SecY.
    pub fn pattern_set(
        &self,
        id: SecyId,
        direction: Direction,
        action: MatchAction,
        pattern: MatchPattern,
    ) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            hw.driver
                .rule_write(hw.port, secy.slot, direction, action, &pattern)?;
            secy.patterns.insert((direction, action), pattern);
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::SecurityPolicy, SOURCE, "pattern_set")
                .with_result(&result)
                .with_object_id(format!("{}/{}/{}", id, direction, action))
                .with_object_type("macsec_pattern")
                .with_details(serde_json::json!({
                    "priority": pattern.priority,
                    "ethertype": pattern.ethertype.map(|etype| etype.to_string()),
                    "src_mac": pattern.src_mac.map(|mac| mac.to_string()),
                    "dest_mac": pattern.dest_mac.map(|mac| mac.to_string()),
                    "is_control": pattern.is_control,
                }))
        );
        result
    }

    pub fn pattern_delete(
        &self,
        id: SecyId,
        direction: Direction,
        action: MatchAction,
    ) -> MacsecResult<()> {
        let result = self.with_secy(id, |hw, secy| {
            if !secy.patterns.contains_key(&(direction, action)) {
                return Err(MacsecError::not_found(format!(
                    "{} {} rule on SecY {}",
                    direction, action, id
                )));
            }
            hw.driver.rule_clear(hw.port, secy.slot, direction, action)?;
            secy.patterns.remove(&(direction, action));
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::SecurityPolicy, SOURCE, "pattern_delete")
                .with_result(&result)
                .with_object_id(format!("{}/{}/{}", id, direction, action))
                .with_object_type("macsec_pattern")
        );
        result
    }

    pub fn pattern_get(
        &self,
        id: SecyId,
        direction: Direction,
        action: MatchAction,
    ) -> MacsecResult<MatchPattern> {
        self.with_secy(id, |_, secy| {
            secy.patterns.get(&(direction, action)).copied().ok_or_else(|| {
                MacsecError::not_found(format!("{} {} rule on SecY {}", direction, action, id))
            })
        })
    }

    /// Action for frames no rule matches, per direction, control and
    /// MACsec class.
    pub fn default_action_set(&self, port: PortNo, policy: DefaultActionPolicy) -> MacsecResult<()> {
        let result = self.with_engine(port, |entry| {
            entry.hw.driver.default_action_write(port, &policy)?;
            entry.default_policy = policy;
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::SecurityPolicy, SOURCE, "default_action_set")
                .with_result(&result)
                .with_object_id(format!("port{}", port))
                .with_object_type("macsec_default_action")
                .with_details(serde_json::json!(policy))
        );
        result
    }

    pub fn default_action_get(&self, port: PortNo) -> MacsecResult<DefaultActionPolicy> {
        self.with_engine(port, |entry| Ok(entry.default_policy))
    }

    /// Adds a control-frame rule in the lowest free index and returns it.
    pub fn control_frame_match_set(
        &self,
        port: PortNo,
        rule: ControlFrameMatch,
    ) -> MacsecResult<u8> {
        let result = self.with_engine(port, |entry| {
            rule.validate()?;
            let max = entry.hw.caps().control_frame_rules;
            let index = (0..max)
                .find(|index| !entry.control_rules.contains_key(index))
                .ok_or_else(|| {
                    MacsecError::invalid_argument(format!(
                        "all {} control frame rules on port {} are in use",
                        max, port
                    ))
                })?;
            entry.hw.driver.control_frame_rule_write(port, index, &rule)?;
            entry.control_rules.insert(index, rule);
            debug_log!(SOURCE, port = %port, index, "control frame rule added");
            Ok(index)
        });

        audit_log!(
            AuditRecord::new(AuditCategory::SecurityPolicy, SOURCE, "control_frame_match_set")
                .with_result(&result)
                .with_object_id(format!("port{}", port))
                .with_object_type("macsec_control_frame_rule")
                .with_details(serde_json::json!({
                    "index": result.as_ref().ok(),
                    "ethertype": rule.ethertype.map(|etype| etype.to_string()),
                    "dest_mac": rule.dest_mac.map(|mac| mac.to_string()),
                }))
        );
        result
    }

    pub fn control_frame_match_delete(&self, port: PortNo, index: u8) -> MacsecResult<()> {
        let result = self.with_engine(port, |entry| {
            if !entry.control_rules.contains_key(&index) {
                return Err(MacsecError::not_found(format!(
                    "control frame rule {} on port {}",
                    index, port
                )));
            }
            entry.hw.driver.control_frame_rule_clear(port, index)?;
            entry.control_rules.remove(&index);
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::SecurityPolicy, SOURCE, "control_frame_match_delete")
                .with_result(&result)
                .with_object_id(format!("port{}/{}", port, index))
                .with_object_type("macsec_control_frame_rule")
        );
        result
    }

    pub fn control_frame_match_get(&self, port: PortNo, index: u8) -> MacsecResult<ControlFrameMatch> {
        self.with_engine(port, |entry| {
            entry.control_rules.get(&index).copied().ok_or_else(|| {
                MacsecError::not_found(format!("control frame rule {} on port {}", index, port))
            })
        })
    }

    /// Classifies `frame` as the engine would: everything passes in bypass
    /// mode, otherwise the winning rule across every SecY on the port, else
    /// the non-MACsec ingress drop, else the default policy for the frame's
    /// class.
    pub fn pattern_resolve(
        &self,
        port: PortNo,
        direction: Direction,
        frame: &Frame,
    ) -> MacsecResult<Resolution> {
        self.with_engine(port, |entry| {
            if entry.init.bypass == BypassMode::Enable {
                return Ok(Resolution::Bypassed);
            }
            let control = is_control_frame(entry.control_rules.values(), frame);
            let rules = entry.secys.values().flat_map(|secy| {
                secy.patterns
                    .iter()
                    .filter(move |((dir, _), _)| *dir == direction)
                    .map(move |((_, action), pattern)| (secy.slot, *action, pattern))
            });
            match resolve(rules, frame, control) {
                Some((slot, action)) => {
                    let secy = entry.secy_at_slot(slot).ok_or_else(|| {
                        MacsecError::not_found(format!("SecY in slot {} on port {}", slot, port))
                    })?;
                    Ok(Resolution::Rule { secy, action })
                }
                None if direction == Direction::Ingress
                    && entry.init.ingress_drop_non_macsec
                    && !control
                    && !frame.is_macsec() =>
                {
                    Ok(Resolution::Default(DefaultAction::Drop))
                }
                None => Ok(Resolution::Default(entry.default_policy.action_for(
                    direction,
                    control,
                    frame.is_macsec(),
                ))),
            }
        })
    }
}
