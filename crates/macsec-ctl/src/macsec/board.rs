//! Board context and port-level operations.

use super::secy::teardown_secy;
use super::types::{EngineStatus, MacsecStats, SecyEntry, SecyId};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::config::MacsecCtlConfig;
use crate::{audit_log, debug_log, info_log, warn_log};
use macsec_hal::{
    BypassMode, Capabilities, CapturedFrame, ControlFrameMatch, DefaultActionPolicy, EventMask,
    Exclusion, ExclusionGuard, FrameCapture, InitConf, MacsecDriver, MacsecError, MacsecResult,
    NoExclusion, PortInfo, PortNo, RawCsr, RegisterDriver, RegisterTransport,
};
use macsec_types::AssocNum;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) const SOURCE: &str = "MacsecBoard";

/// Hardware side of a port: identity and the driver programming it.
pub(crate) struct PortHw {
    pub port: PortNo,
    pub info: PortInfo,
    pub driver: Box<dyn MacsecDriver>,
}

impl PortHw {
    pub fn caps(&self) -> Capabilities {
        self.info.capabilities()
    }
}

#[derive(Debug, Default)]
pub(crate) struct MonitorState {
    pub enabled: EventMask,
    /// Edges latched by `tick` and not yet reported by a poll.
    pub pending: EventMask,
    /// Status seen by the previous tick.
    pub previous: EventMask,
    /// SecY slot and AN behind the latest edge.
    pub last_sa: Option<(u8, AssocNum)>,
}

pub(crate) struct PortEntry {
    pub hw: PortHw,
    pub init: InitConf,
    pub default_policy: DefaultActionPolicy,
    pub control_rules: BTreeMap<u8, ControlFrameMatch>,
    pub secys: BTreeMap<SecyId, SecyEntry>,
    pub monitor: MonitorState,
}

impl PortEntry {
    fn new(hw: PortHw) -> Self {
        PortEntry {
            hw,
            init: InitConf::default(),
            default_policy: DefaultActionPolicy::default(),
            control_rules: BTreeMap::new(),
            secys: BTreeMap::new(),
            monitor: MonitorState::default(),
        }
    }

    pub fn require_engine(&self) -> MacsecResult<()> {
        if self.init.enable {
            Ok(())
        } else {
            Err(MacsecError::EngineNotEnabled {
                port: self.hw.port.as_u32(),
            })
        }
    }

    pub fn secy(&self, id: SecyId) -> MacsecResult<&SecyEntry> {
        self.secys
            .get(&id)
            .ok_or_else(|| MacsecError::not_found(format!("SecY {}", id)))
    }

    pub fn secy_mut(&mut self, id: SecyId) -> MacsecResult<(&PortHw, &mut SecyEntry)> {
        let secy = self
            .secys
            .get_mut(&id)
            .ok_or_else(|| MacsecError::not_found(format!("SecY {}", id)))?;
        Ok((&self.hw, secy))
    }

    pub fn free_secy_slot(&self) -> MacsecResult<u8> {
        let max = self.hw.caps().max_secy;
        (0..max)
            .find(|slot| self.secys.values().all(|secy| secy.slot != *slot))
            .ok_or_else(|| {
                MacsecError::invalid_argument(format!(
                    "all {} SecY slots on port {} are in use",
                    max, self.hw.port
                ))
            })
    }

    pub fn free_rx_slot(&self) -> MacsecResult<u8> {
        let max = self.hw.caps().max_rx_sc;
        let used: Vec<u8> = self
            .secys
            .values()
            .flat_map(|secy| secy.rx_scs.values().map(|rx| rx.rx_slot))
            .collect();
        (0..max).find(|slot| !used.contains(slot)).ok_or_else(|| {
            MacsecError::invalid_argument(format!(
                "all {} receive SC slots on port {} are in use",
                max, self.hw.port
            ))
        })
    }

    pub fn secy_at_slot(&self, slot: u8) -> Option<SecyId> {
        self.secys
            .iter()
            .find(|(_, secy)| secy.slot == slot)
            .map(|(id, _)| *id)
    }
}

/// Control-plane context for one board.
///
/// Created empty; ports are added with [`attach_port`](Self::attach_port)
/// and removed with [`detach_port`](Self::detach_port). All configuration
/// calls take `&self`.
pub struct MacsecBoard {
    transport: Arc<dyn RegisterTransport>,
    exclusion: Arc<dyn Exclusion>,
    config: MacsecCtlConfig,
    ports: BTreeMap<PortNo, Mutex<PortEntry>>,
    stats: Mutex<MacsecStats>,
}

impl MacsecBoard {
    pub fn new(transport: Arc<dyn RegisterTransport>, config: MacsecCtlConfig) -> Self {
        Self::with_exclusion(transport, Arc::new(NoExclusion), config)
    }

    /// Out-of-range tunables are logged and clamped rather than refused.
    pub fn with_exclusion(
        transport: Arc<dyn RegisterTransport>,
        exclusion: Arc<dyn Exclusion>,
        config: MacsecCtlConfig,
    ) -> Self {
        if let Err(err) = config.validate() {
            warn_log!(SOURCE, error = %err, "config out of range, clamping");
        }
        MacsecBoard {
            transport,
            exclusion,
            config,
            ports: BTreeMap::new(),
            stats: Mutex::new(MacsecStats::default()),
        }
    }

    pub fn config(&self) -> &MacsecCtlConfig {
        &self.config
    }

    pub fn stats(&self) -> MacsecStats {
        self.stats.lock().clone()
    }

    pub fn ports(&self) -> Vec<PortNo> {
        self.ports.keys().copied().collect()
    }

    /// Attaches a port programmed through the register-map driver.
    pub fn attach_port(&mut self, port: PortNo, info: PortInfo) -> MacsecResult<()> {
        let driver = RegisterDriver::new(
            info,
            Arc::clone(&self.transport),
            self.config.poll_config(),
        );
        self.attach_port_with_driver(port, info, Box::new(driver))
    }

    pub fn attach_port_with_driver(
        &mut self,
        port: PortNo,
        info: PortInfo,
        driver: Box<dyn MacsecDriver>,
    ) -> MacsecResult<()> {
        if self.ports.contains_key(&port) {
            return Err(MacsecError::already_exists(format!("port {}", port)));
        }
        self.ports
            .insert(port, Mutex::new(PortEntry::new(PortHw { port, info, driver })));
        self.bump(|s| s.ports_attached = s.ports_attached.saturating_add(1));

        audit_log!(
            AuditRecord::new(AuditCategory::SystemLifecycle, SOURCE, "attach_port")
                .with_outcome(AuditOutcome::Success)
                .with_object_id(format!("port{}", port))
                .with_object_type("macsec_engine")
                .with_details(serde_json::json!({
                    "family": info.family,
                    "macsec_capable": info.macsec_capable,
                }))
        );
        Ok(())
    }

    /// Deletes every SecY on the port (wiping keys), turns the engine off
    /// and forgets the port. On failure the port stays attached with
    /// whatever was not yet torn down.
    pub fn detach_port(&mut self, port: PortNo) -> MacsecResult<()> {
        let lock = self
            .ports
            .get(&port)
            .ok_or_else(|| MacsecError::not_found(format!("port {}", port)))?;
        {
            let _guard = ExclusionGuard::enter(self.exclusion.as_ref());
            let mut entry = lock.lock();
            let ids: Vec<SecyId> = entry.secys.keys().copied().collect();
            for id in ids {
                let PortEntry { hw, secys, .. } = &mut *entry;
                if let Some(secy) = secys.get_mut(&id) {
                    teardown_secy(hw, id, secy)?;
                }
                secys.remove(&id);
            }
            if entry.init.enable {
                let conf = InitConf {
                    enable: false,
                    bypass: BypassMode::None,
                    ..entry.init
                };
                entry.hw.driver.init_set(port, &conf)?;
                entry.init.enable = false;
            }
        }
        self.ports.remove(&port);
        self.bump(|s| s.ports_attached = s.ports_attached.saturating_sub(1));

        audit_log!(
            AuditRecord::new(AuditCategory::SystemLifecycle, SOURCE, "detach_port")
                .with_outcome(AuditOutcome::Success)
                .with_object_id(format!("port{}", port))
                .with_object_type("macsec_engine")
        );
        Ok(())
    }

    pub(crate) fn with_port<T>(
        &self,
        port: PortNo,
        f: impl FnOnce(&mut PortEntry) -> MacsecResult<T>,
    ) -> MacsecResult<T> {
        let lock = self
            .ports
            .get(&port)
            .ok_or_else(|| MacsecError::not_found(format!("port {}", port)))?;
        let _guard = ExclusionGuard::enter(self.exclusion.as_ref());
        let mut entry = lock.lock();
        f(&mut entry)
    }

    /// Like [`with_port`](Self::with_port), refusing while the engine is off.
    pub(crate) fn with_engine<T>(
        &self,
        port: PortNo,
        f: impl FnOnce(&mut PortEntry) -> MacsecResult<T>,
    ) -> MacsecResult<T> {
        self.with_port(port, |entry| {
            entry.require_engine()?;
            f(entry)
        })
    }

    pub(crate) fn with_secy<T>(
        &self,
        id: SecyId,
        f: impl FnOnce(&PortHw, &mut SecyEntry) -> MacsecResult<T>,
    ) -> MacsecResult<T> {
        self.with_engine(id.port, |entry| {
            let (hw, secy) = entry.secy_mut(id)?;
            f(hw, secy)
        })
    }

    pub(crate) fn bump(&self, f: impl FnOnce(&mut MacsecStats)) {
        f(&mut self.stats.lock());
    }

    // Engine

    /// Turns the engine on or off and sets bypass.
    ///
    /// `BypassMode::None` keeps the current bypass setting. Asking for
    /// bypass-disable while turning the engine off is refused. The first
    /// enable also writes the cached default policy (all classes Drop until
    /// changed).
    pub fn engine_init(&self, port: PortNo, enable: bool, bypass: BypassMode) -> MacsecResult<()> {
        let result = self.with_port(port, |entry| {
            if bypass == BypassMode::Disable && !enable {
                return Err(MacsecError::EngineNotEnabled {
                    port: port.as_u32(),
                });
            }
            let conf = InitConf {
                enable,
                bypass,
                ingress_drop_non_macsec: self.config.ingress_drop_non_macsec,
                lmac_disable_length_validate: self.config.lmac_disable_length_validate,
                hmac_disable_length_validate: self.config.hmac_disable_length_validate,
            };
            entry.hw.driver.init_set(port, &conf)?;
            let turned_on = enable && !entry.init.enable;
            entry.init = InitConf {
                bypass: match bypass {
                    BypassMode::None => entry.init.bypass,
                    other => other,
                },
                ..conf
            };
            if turned_on {
                entry
                    .hw
                    .driver
                    .default_action_write(port, &entry.default_policy)?;
                info_log!(SOURCE, port = %port, family = %entry.hw.info.family, "MACsec engine enabled");
            }
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::ConfigurationChange, SOURCE, "engine_init")
                .with_result(&result)
                .with_object_id(format!("port{}", port))
                .with_object_type("macsec_engine")
                .with_details(serde_json::json!({
                    "enable": enable,
                    "bypass": bypass,
                }))
        );
        result
    }

    pub fn engine_status(&self, port: PortNo) -> MacsecResult<EngineStatus> {
        self.with_port(port, |entry| {
            if !entry.hw.caps().macsec {
                return Ok(EngineStatus::default());
            }
            let conf = entry.hw.driver.init_get(port)?;
            Ok(EngineStatus {
                capable: true,
                enabled: conf.enable,
                bypassed: conf.bypass == BypassMode::Enable,
            })
        })
    }

    /// Engine configuration as read back from hardware.
    pub fn engine_conf_get(&self, port: PortNo) -> MacsecResult<InitConf> {
        self.with_port(port, |entry| entry.hw.driver.init_get(port))
    }

    pub fn capabilities_get(&self, port: PortNo) -> MacsecResult<Capabilities> {
        self.with_port(port, |entry| Ok(entry.hw.caps()))
    }

    /// Largest frame the engine passes on egress; 0 disables the check.
    pub fn mtu_set(&self, port: PortNo, mtu: u16) -> MacsecResult<()> {
        self.with_port(port, |entry| {
            entry.hw.driver.mtu_write(port, mtu)?;
            debug_log!(SOURCE, port = %port, mtu, "MTU set");
            Ok(())
        })
    }

    pub fn mtu_get(&self, port: PortNo) -> MacsecResult<u16> {
        self.with_port(port, |entry| entry.hw.driver.mtu_read(port))
    }

    // Debug

    /// Arms the one-shot capture buffer for the next frame in `capture`'s
    /// direction.
    pub fn frame_capture_set(&self, port: PortNo, capture: FrameCapture) -> MacsecResult<()> {
        self.with_port(port, |entry| entry.hw.driver.capture_arm(port, capture))
    }

    /// Drains the capture buffer. `None` when nothing was captured.
    pub fn frame_get(&self, port: PortNo, max_len: usize) -> MacsecResult<Option<CapturedFrame>> {
        self.with_port(port, |entry| entry.hw.driver.capture_read(port, max_len))
    }

    pub fn csr_read(&self, port: PortNo, csr: RawCsr) -> MacsecResult<u32> {
        self.with_port(port, |entry| entry.hw.driver.csr_read(port, csr))
    }

    pub fn csr_write(&self, port: PortNo, csr: RawCsr, value: u32) -> MacsecResult<()> {
        self.with_port(port, |entry| {
            debug_log!(SOURCE, port = %port, csr = %csr, value, "raw CSR write");
            entry.hw.driver.csr_write(port, csr, value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macsec::test_support::*;
    use macsec_hal::regs::{self, SaSlot};
    use macsec_hal::{DefaultAction, PhyFamily};
    use macsec_types::CipherSuite;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_attach_twice_and_unknown_port() {
        let (_sim, mut board) = attached(PhyFamily::Viper);
        assert!(matches!(
            board.attach_port(PORT, PortInfo::new(PhyFamily::Viper, true)),
            Err(MacsecError::AlreadyExists { .. })
        ));
        assert!(matches!(
            board.engine_status(PortNo::new(9)),
            Err(MacsecError::NotFound { .. })
        ));
        assert_eq!(board.ports(), vec![PORT]);
        assert_eq!(board.stats().ports_attached, 1);
    }

    #[test]
    fn test_engine_init_and_status() {
        let (sim, board) = attached(PhyFamily::Viper);
        assert_eq!(
            board.engine_status(PORT).unwrap(),
            EngineStatus {
                capable: true,
                enabled: false,
                bypassed: false,
            }
        );

        sim.poke(PORT, regs::DEFAULT_ACTION, 0x3f);
        board.engine_init(PORT, true, BypassMode::Disable).unwrap();
        let status = board.engine_status(PORT).unwrap();
        assert!(status.enabled);
        assert!(!status.bypassed);
        // first enable writes the all-Drop default policy
        assert_eq!(sim.peek(PORT, regs::DEFAULT_ACTION), 0);
        assert_eq!(
            DefaultActionPolicy::from_raw(sim.peek(PORT, regs::DEFAULT_ACTION)),
            DefaultActionPolicy::all(DefaultAction::Drop)
        );
        assert!(board.engine_conf_get(PORT).unwrap().ingress_drop_non_macsec);
    }

    #[test]
    fn test_zero_poll_attempts_still_loads_keys() {
        let sim = Arc::new(macsec_sim::SimPhy::new());
        let config = MacsecCtlConfig {
            key_install_poll_attempts: 0,
            ..Default::default()
        };
        let mut board = MacsecBoard::new(sim.clone(), config);
        board
            .attach_port(PORT, PortInfo::new(PhyFamily::Viper, true))
            .unwrap();
        board.engine_init(PORT, true, BypassMode::Disable).unwrap();
        board
            .secy_create(id(), secy_conf(CipherSuite::GcmAes128))
            .unwrap();
        board.tx_sc_create(id()).unwrap();

        board
            .tx_sa_set(id(), AssocNum::AN0, 1, true, key(16))
            .unwrap();
        assert_eq!(board.stats().key_installs_failed, 0);
    }

    #[test]
    fn test_bypass_none_keeps_current_setting() {
        let (_sim, board) = attached(PhyFamily::Viper);
        board.engine_init(PORT, true, BypassMode::Enable).unwrap();
        board.engine_init(PORT, true, BypassMode::None).unwrap();
        assert!(board.engine_status(PORT).unwrap().bypassed);
    }

    #[test]
    fn test_disable_bypass_needs_enabled_engine() {
        let (_sim, board) = attached(PhyFamily::Viper);
        assert_eq!(
            board.engine_init(PORT, false, BypassMode::Disable),
            Err(MacsecError::EngineNotEnabled { port: 3 })
        );
        assert!(!board.engine_status(PORT).unwrap().enabled);
    }

    #[test]
    fn test_tesla_has_no_engine() {
        let (_sim, board) = attached(PhyFamily::Tesla);
        assert_eq!(board.engine_status(PORT).unwrap(), EngineStatus::default());
        assert!(board
            .engine_init(PORT, true, BypassMode::Disable)
            .unwrap_err()
            .is_not_implemented());
        assert_eq!(board.capabilities_get(PORT).unwrap(), Capabilities::NONE);
        assert!(board.mtu_set(PORT, 1500).unwrap_err().is_not_implemented());
    }

    #[test]
    fn test_mtu_round_trip() {
        let (_sim, board) = attached(PhyFamily::Malibu25g);
        board.mtu_set(PORT, 9216).unwrap();
        assert_eq!(board.mtu_get(PORT).unwrap(), 9216);
    }

    #[test]
    fn test_frame_get_without_capture() {
        let (_sim, board) = attached(PhyFamily::Viper);
        board.frame_capture_set(PORT, FrameCapture::Egress).unwrap();
        assert_eq!(board.frame_get(PORT, 64).unwrap(), None);

        let (_sim, indy) = attached(PhyFamily::Indy);
        assert!(indy
            .frame_capture_set(PORT, FrameCapture::Ingress)
            .unwrap_err()
            .is_not_implemented());
    }

    #[test]
    fn test_csr_passthrough() {
        let (sim, board) = attached(PhyFamily::Viper);
        let csr = RawCsr::new(0x1f, 0x0002);
        board.csr_write(PORT, csr, 1518).unwrap();
        assert_eq!(sim.peek(PORT, csr), 1518);
        assert_eq!(board.csr_read(PORT, csr).unwrap(), 1518);
    }

    #[test]
    fn test_detach_wipes_keys_and_disables_engine() {
        let (sim, mut board) = with_secy(PhyFamily::Viper, CipherSuite::GcmAes256);
        board.tx_sc_create(id()).unwrap();
        board
            .tx_sa_set(id(), AssocNum::AN0, 1, true, key(32))
            .unwrap();
        board.tx_sa_activate(id(), AssocNum::AN0).unwrap();
        let sa = SaSlot::Tx {
            secy_slot: 0,
            an: AssocNum::AN0,
        };
        let key_word = sa.base().offset(regs::SA_KEY_WORD);
        assert_ne!(sim.peek(PORT, key_word), 0);

        board.detach_port(PORT).unwrap();
        assert_eq!(sim.peek(PORT, key_word), 0);
        assert_eq!(sim.peek(PORT, sa.base()), 0);
        assert_eq!(sim.peek(PORT, regs::GLOBAL_CTRL) & regs::CTRL_ENABLE, 0);
        assert!(board.ports().is_empty());
        assert_eq!(board.stats().ports_attached, 0);
    }

    #[derive(Default)]
    struct CountingExclusion {
        entries: AtomicU32,
        exits: AtomicU32,
    }

    impl Exclusion for CountingExclusion {
        fn enter(&self) {
            self.entries.fetch_add(1, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.exits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_every_call_is_bracketed_by_exclusion() {
        let sim = Arc::new(macsec_sim::SimPhy::new());
        let exclusion = Arc::new(CountingExclusion::default());
        let mut board =
            MacsecBoard::with_exclusion(sim, exclusion.clone(), MacsecCtlConfig::default());
        board
            .attach_port(PORT, PortInfo::new(PhyFamily::Viper, true))
            .unwrap();

        board.engine_init(PORT, true, BypassMode::Disable).unwrap();
        let _ = board.secy_get(id());
        assert_eq!(exclusion.entries.load(Ordering::SeqCst), 2);
        assert_eq!(exclusion.exits.load(Ordering::SeqCst), 2);
    }
}
