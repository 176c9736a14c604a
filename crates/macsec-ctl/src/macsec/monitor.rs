//! Sequence-event monitor.
//!
//! The engine latches rollover and threshold events in a sticky status
//! register. [`MacsecBoard::tick`] samples it on every port with the engine
//! on and remembers new edges; [`MacsecBoard::event_poll`] reports and
//! clears them. Events are raised by transmit SAs only.

use super::board::{MacsecBoard, PortEntry, SOURCE};
use super::types::SecyId;
use crate::audit::{AuditCategory, AuditRecord};
use crate::{audit_log, debug_log, info_log, warn_log};
use macsec_hal::{EventMask, MacsecError, MacsecResult, PortNo};
use macsec_types::AssocNum;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn tick_port(entry: &mut PortEntry) -> MacsecResult<()> {
    let port = entry.hw.port;
    let monitor = &mut entry.monitor;
    let current = entry.hw.driver.event_status_read(port)? & monitor.enabled;
    let edges = current & !monitor.previous;
    monitor.previous = current;
    if edges.is_empty() {
        return Ok(());
    }
    monitor.pending |= edges;
    monitor.last_sa = entry.hw.driver.event_sa_read(port)?;
    debug_log!(SOURCE, port = %port, events = ?edges, sa = ?monitor.last_sa, "sequence event latched");
    Ok(())
}

impl MacsecBoard {
    /// Enables (`enable`) or disables the event types in `mask`, leaving
    /// the others as they are.
    pub fn event_enable_set(&self, port: PortNo, mask: EventMask, enable: bool) -> MacsecResult<()> {
        let result = self.with_port(port, |entry| {
            let enabled = if enable {
                entry.monitor.enabled | mask
            } else {
                entry.monitor.enabled & !mask
            };
            entry.hw.driver.event_mask_write(port, enabled)?;
            entry.monitor.enabled = enabled;
            entry.monitor.pending &= enabled;
            Ok(())
        });

        audit_log!(
            AuditRecord::new(AuditCategory::ConfigurationChange, SOURCE, "event_enable_set")
                .with_result(&result)
                .with_object_id(format!("port{}", port))
                .with_object_type("macsec_events")
                .with_details(serde_json::json!({
                    "mask": mask.bits(),
                    "enable": enable,
                }))
        );
        result
    }

    pub fn event_enable_get(&self, port: PortNo) -> MacsecResult<EventMask> {
        self.with_port(port, |entry| entry.hw.driver.event_mask_read(port))
    }

    /// Samples event status on every port whose engine is on. All ports are
    /// visited; the first failure is returned.
    pub fn tick(&self) -> MacsecResult<()> {
        let mut first_err = None;
        for port in self.ports() {
            let result = self.with_port(port, |entry| {
                if !entry.init.enable {
                    return Ok(());
                }
                tick_port(entry)
            });
            if let Err(err) = result {
                warn_log!(SOURCE, port = %port, error = %err, "event tick failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Events seen since the previous poll. Reported events are cleared in
    /// hardware so they can latch again.
    pub fn event_poll(&self, port: PortNo) -> MacsecResult<EventMask> {
        let events = self.with_port(port, |entry| {
            tick_port(entry)?;
            let events = entry.monitor.pending & entry.monitor.enabled;
            entry.monitor.pending = EventMask::empty();
            if !entry.monitor.previous.is_empty() {
                entry
                    .hw
                    .driver
                    .event_status_clear(port, entry.monitor.previous)?;
                entry.monitor.previous = EventMask::empty();
            }
            Ok(events)
        })?;
        if !events.is_empty() {
            self.bump(|s| s.events_reported = s.events_reported.saturating_add(1));
        }
        Ok(events)
    }

    /// SecY and AN of the SA behind the most recent event, if that SecY
    /// still exists.
    pub fn event_sa_get(&self, port: PortNo) -> MacsecResult<Option<(SecyId, AssocNum)>> {
        self.with_port(port, |entry| {
            Ok(entry
                .monitor
                .last_sa
                .and_then(|(slot, an)| entry.secy_at_slot(slot).map(|id| (id, an))))
        })
    }

    /// Packet-number threshold for the threshold event. The comparison uses
    /// the low 32 bits of the packet number.
    pub fn seq_threshold_set(&self, port: PortNo, threshold: u32) -> MacsecResult<()> {
        let result = self.with_port(port, |entry| {
            if !entry.hw.caps().xpn {
                return Err(MacsecError::not_implemented(format!(
                    "sequence threshold on {}",
                    entry.hw.info.family
                )));
            }
            if threshold == 0 {
                return Err(MacsecError::invalid_argument("threshold must be non-zero"));
            }
            entry.hw.driver.seq_threshold_write(port, threshold)
        });

        audit_log!(
            AuditRecord::new(AuditCategory::ConfigurationChange, SOURCE, "seq_threshold_set")
                .with_result(&result)
                .with_object_id(format!("port{}", port))
                .with_object_type("macsec_events")
                .with_details(serde_json::json!({ "threshold": threshold }))
        );
        result
    }

    pub fn seq_threshold_get(&self, port: PortNo) -> MacsecResult<u32> {
        self.with_port(port, |entry| entry.hw.driver.seq_threshold_read(port))
    }
}

/// Calls [`MacsecBoard::tick`] every `interval` until `shutdown` is set.
pub async fn run_monitor(board: Arc<MacsecBoard>, interval: Duration, shutdown: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval(interval);
    info_log!(SOURCE, interval_ms = interval.as_millis() as u64, "event monitor started");
    loop {
        ticker.tick().await;
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        // failures are logged per port by tick()
        let _ = board.tick();
    }
    info_log!(SOURCE, "event monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macsec::test_support::*;
    use macsec_hal::{Direction, Frame, MatchAction, MatchPattern, PhyFamily};
    use macsec_sim::SimPhy;
    use macsec_types::{CipherSuite, EtherType, Ssci};
    use pretty_assertions::assert_eq;

    fn frame() -> Frame {
        Frame::new(peer(), local(), EtherType::IPV4).with_payload(vec![0; 46])
    }

    /// SecY with every egress frame steered to the controlled port and one
    /// active transmit SA in AN0.
    fn transmitting(
        family: PhyFamily,
        cipher_suite: CipherSuite,
        next_pn: u64,
    ) -> (Arc<SimPhy>, MacsecBoard) {
        let (sim, board) = with_secy(family, cipher_suite);
        board
            .pattern_set(
                id(),
                Direction::Egress,
                MatchAction::ControlledPort,
                MatchPattern::default(),
            )
            .unwrap();
        board.controlled_port_set(id(), true).unwrap();
        board.tx_sc_create(id()).unwrap();
        if cipher_suite.is_xpn() {
            board
                .tx_sa_set_xpn(id(), AssocNum::AN0, next_pn, true, xpn_key(16), Ssci::from_u32(1))
                .unwrap();
        } else {
            board
                .tx_sa_set(id(), AssocNum::AN0, next_pn as u32, true, key(16))
                .unwrap();
        }
        board.tx_sa_activate(id(), AssocNum::AN0).unwrap();
        (sim, board)
    }

    #[test]
    fn test_rollover_reported_once_when_enabled() {
        let (sim, board) =
            transmitting(PhyFamily::Viper, CipherSuite::GcmAes128, u64::from(u32::MAX));
        board
            .event_enable_set(PORT, EventMask::ROLLOVER, true)
            .unwrap();
        assert_eq!(board.event_enable_get(PORT).unwrap(), EventMask::ROLLOVER);

        assert!(!sim.egress(PORT, &frame()).is_drop());
        board.tick().unwrap();
        assert_eq!(board.event_poll(PORT).unwrap(), EventMask::ROLLOVER);
        assert_eq!(board.event_sa_get(PORT).unwrap(), Some((id(), AssocNum::AN0)));
        assert_eq!(board.event_poll(PORT).unwrap(), EventMask::empty());
        assert_eq!(board.stats().events_reported, 1);
    }

    #[test]
    fn test_rollover_not_reported_when_disabled() {
        let (sim, board) =
            transmitting(PhyFamily::Viper, CipherSuite::GcmAes128, u64::from(u32::MAX));
        assert!(!sim.egress(PORT, &frame()).is_drop());
        board.tick().unwrap();
        assert_eq!(board.event_poll(PORT).unwrap(), EventMask::empty());
        assert_eq!(board.event_sa_get(PORT).unwrap(), None);
    }

    #[test]
    fn test_threshold_crossing_on_xpn() {
        let (sim, board) = transmitting(PhyFamily::Malibu25g, CipherSuite::GcmAesXpn128, 1);
        board.seq_threshold_set(PORT, 3).unwrap();
        assert_eq!(board.seq_threshold_get(PORT).unwrap(), 3);
        board
            .event_enable_set(PORT, EventMask::SEQ_THRESHOLD, true)
            .unwrap();

        sim.egress(PORT, &frame());
        assert_eq!(board.event_poll(PORT).unwrap(), EventMask::empty());
        sim.egress(PORT, &frame());
        assert_eq!(board.event_poll(PORT).unwrap(), EventMask::SEQ_THRESHOLD);
    }

    #[test]
    fn test_threshold_needs_xpn_family() {
        let (_sim, board) = attached(PhyFamily::Viper);
        assert!(board.seq_threshold_set(PORT, 5).unwrap_err().is_not_implemented());
        assert!(board
            .event_enable_set(PORT, EventMask::SEQ_THRESHOLD, true)
            .unwrap_err()
            .is_not_implemented());

        let (_sim, board) = attached(PhyFamily::Indy);
        assert!(matches!(
            board.seq_threshold_set(PORT, 0),
            Err(MacsecError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_disabling_one_type_keeps_the_other() {
        let (_sim, board) = attached(PhyFamily::Malibu25g);
        board
            .event_enable_set(PORT, EventMask::ROLLOVER | EventMask::SEQ_THRESHOLD, true)
            .unwrap();
        board
            .event_enable_set(PORT, EventMask::SEQ_THRESHOLD, false)
            .unwrap();
        assert_eq!(board.event_enable_get(PORT).unwrap(), EventMask::ROLLOVER);
    }

    #[test]
    fn test_tick_skips_ports_with_engine_off() {
        let (sim, board) = attached(PhyFamily::Viper);
        board
            .event_enable_set(PORT, EventMask::ROLLOVER, true)
            .unwrap();
        sim.poke(PORT, macsec_hal::regs::EVENT_STATUS, EventMask::ROLLOVER.bits());
        let before = sim.access_count();
        board.tick().unwrap();
        assert_eq!(sim.access_count(), before);
    }

    #[tokio::test]
    async fn test_monitor_task_stops_on_shutdown() {
        let (sim, board) =
            transmitting(PhyFamily::Viper, CipherSuite::GcmAes128, u64::from(u32::MAX));
        board
            .event_enable_set(PORT, EventMask::ROLLOVER, true)
            .unwrap();
        let board = Arc::new(board);
        let shutdown = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_monitor(
            Arc::clone(&board),
            Duration::from_millis(5),
            Arc::clone(&shutdown),
        ));

        sim.egress(PORT, &frame());
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.store(true, Ordering::Relaxed);
        task.await.unwrap();
        assert_eq!(board.event_poll(PORT).unwrap(), EventMask::ROLLOVER);
    }
}
