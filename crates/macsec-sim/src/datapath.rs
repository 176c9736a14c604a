//! Reference datapath over the emulated register file.
//!
//! Frames are pushed through the tables exactly as programmed: control-frame
//! detection, rule resolution, the default-action policy, the controlled-port
//! gate and SA selection. Packet numbers are consumed from the SA records so
//! tests observe the same cursors the control plane reads back.

use log::debug;
use macsec_hal::classify::{self, Frame, SecTag};
use macsec_hal::regs::{self, RegisterRecord, RxScRecord, SaRecord, SaSlot, SecyRecord};
use macsec_hal::{
    BypassMode, ControlFrameMatch, CounterGroup, CounterSet, DefaultAction, DefaultActionPolicy,
    Direction, EventMask, FrameCapture, InitConf, MacBlock, MacCounters, MatchAction,
    MatchPattern, PortCounters, PortNo, RxSaCounters, RxScCounters, SecyCounters, TagBypass,
    TxSaCounters, TxScConf, TxScCounters, ValidateFrames,
};
use macsec_types::{EtherType, MacAddress, Sci};

use crate::SimPhy;

/// Table slots scanned per port; larger than any family's tables.
const SCAN_SLOTS: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Longer than the programmed MTU.
    TooLong,
    /// No rule matched and the default action is drop.
    DefaultPolicy,
    /// A drop rule matched.
    Rule,
    /// Non-MACsec frame on a port dropping them.
    NonMacsec,
    ControlledPortDisabled,
    NoTxSc,
    NoEncodingSa,
    /// The encoding SA used its last packet number.
    PnExhausted,
    Untagged,
    UnknownSci,
    NotUsingSa,
    Late,
    NotValid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Egress frame as sent on the line.
    Transmit(Frame),
    /// Ingress frame handed to the host, SecTAG removed.
    Deliver(Frame),
    Drop(DropReason),
}

impl Verdict {
    pub fn is_drop(&self) -> bool {
        matches!(self, Verdict::Drop(_))
    }

    pub fn frame(&self) -> Option<&Frame> {
        match self {
            Verdict::Transmit(frame) | Verdict::Deliver(frame) => Some(frame),
            Verdict::Drop(_) => None,
        }
    }
}

#[derive(Clone, Copy)]
enum Resolved {
    Pass,
    Drop(DropReason),
    Controlled(u8),
}

impl SimPhy {
    /// Sends `frame` from the host towards the line.
    pub fn egress(&self, port: PortNo, frame: &Frame) -> Verdict {
        self.count_mac(port, MacBlock::Host, frame, false);
        let resolved = self.resolve(port, Direction::Egress, frame);
        let verdict = match resolved {
            Resolved::Pass => Verdict::Transmit(frame.clone()),
            Resolved::Drop(reason) => Verdict::Drop(reason),
            Resolved::Controlled(slot) => self.protect(port, slot, frame),
        };
        self.count_port(port, Direction::Egress, resolved, frame, &verdict);
        if let Verdict::Transmit(out) = &verdict {
            self.count_mac(port, MacBlock::Line, out, true);
            self.update(port, CounterGroup::Common, |c: &mut PortCounters| {
                count_frame(c, out, false)
            });
            self.capture(port, FrameCapture::Egress, out);
        }
        debug!("sim: port {} egress dropped={}", port, verdict.is_drop());
        verdict
    }

    /// Receives `frame` from the line towards the host.
    pub fn ingress(&self, port: PortNo, frame: &Frame) -> Verdict {
        self.count_mac(port, MacBlock::Line, frame, false);
        self.update(port, CounterGroup::Common, |c: &mut PortCounters| {
            count_frame(c, frame, true)
        });
        self.capture(port, FrameCapture::Ingress, frame);
        let resolved = self.resolve(port, Direction::Ingress, frame);
        let verdict = match resolved {
            Resolved::Pass => Verdict::Deliver(frame.clone()),
            Resolved::Drop(reason) => Verdict::Drop(reason),
            Resolved::Controlled(slot) => self.validate(port, slot, frame),
        };
        self.count_port(port, Direction::Ingress, resolved, frame, &verdict);
        if let Verdict::Deliver(out) = &verdict {
            self.count_mac(port, MacBlock::Host, out, true);
        }
        debug!("sim: port {} ingress dropped={}", port, verdict.is_drop());
        verdict
    }

    fn resolve(&self, port: PortNo, direction: Direction, frame: &Frame) -> Resolved {
        let init: InitConf = self.peek_record(port, regs::GLOBAL_CTRL);
        if !init.enable || init.bypass == BypassMode::Enable {
            return Resolved::Pass;
        }

        let control = classify::is_control_frame(&self.control_rules(port), frame);
        let rules = self.rules(port, direction);
        let hit = classify::resolve(
            rules.iter().map(|(slot, action, pattern)| (*slot, *action, pattern)),
            frame,
            control,
        );

        match hit {
            Some((_, MatchAction::Drop)) => Resolved::Drop(DropReason::Rule),
            Some((_, MatchAction::UncontrolledPort)) => Resolved::Pass,
            Some((slot, MatchAction::ControlledPort)) => Resolved::Controlled(slot),
            None => {
                if direction == Direction::Ingress
                    && init.ingress_drop_non_macsec
                    && !control
                    && !frame.is_macsec()
                {
                    return Resolved::Drop(DropReason::NonMacsec);
                }
                let policy = DefaultActionPolicy::from_raw(self.peek(port, regs::DEFAULT_ACTION));
                match policy.action_for(direction, control, frame.is_macsec()) {
                    DefaultAction::Bypass => Resolved::Pass,
                    DefaultAction::Drop => Resolved::Drop(DropReason::DefaultPolicy),
                }
            }
        }
    }

    fn control_rules(&self, port: PortNo) -> Vec<ControlFrameMatch> {
        (0..SCAN_SLOTS)
            .map(regs::ctrl_rule_base)
            .filter(|base| self.peek(port, *base) & regs::VALID != 0)
            .map(|base| self.peek_record(port, base))
            .collect()
    }

    fn rules(&self, port: PortNo, direction: Direction) -> Vec<(u8, MatchAction, MatchPattern)> {
        let mut rules = Vec::new();
        for slot in 0..SCAN_SLOTS {
            if self.peek(port, regs::secy_base(slot)) & regs::VALID == 0 {
                continue;
            }
            for action in MatchAction::ALL {
                let base = regs::rule_base(slot, direction, action);
                if self.peek(port, base) & regs::VALID != 0 {
                    rules.push((slot, action, self.peek_record(port, base)));
                }
            }
        }
        rules
    }

    fn protect(&self, port: PortNo, slot: u8, frame: &Frame) -> Verdict {
        let secy: SecyRecord = self.peek_record(port, regs::secy_base(slot));
        if !secy.controlled {
            return Verdict::Drop(DropReason::ControlledPortDisabled);
        }

        let mtu = (self.peek(port, regs::MTU) & 0xffff) as usize;
        if mtu != 0 && frame.wire_len() > mtu {
            self.update(port, CounterGroup::Secy { slot }, |c: &mut SecyCounters| {
                c.out_pkts_too_long += 1
            });
            return Verdict::Drop(DropReason::TooLong);
        }

        let txsc_word = self.peek(port, regs::secy_base(slot).add(regs::SECY_TXSC_WORD));
        if txsc_word & regs::VALID == 0 {
            return Verdict::Drop(DropReason::NoTxSc);
        }
        let txsc = TxScConf::from_words(&[txsc_word]);
        if !txsc.protect_frames {
            self.update(port, CounterGroup::Secy { slot }, |c: &mut SecyCounters| {
                c.out_pkts_untagged += 1
            });
            return Verdict::Transmit(frame.clone());
        }

        let encoding = regs::decode_encoding_sa(
            self.peek(port, regs::secy_base(slot).add(regs::SECY_ENCODING_SA_WORD)),
        );
        let Some(an) = encoding else {
            return Verdict::Drop(DropReason::NoEncodingSa);
        };
        let sa_slot = SaSlot::Tx {
            secy_slot: slot,
            an,
        };
        let sa: SaRecord = self.peek_record(port, sa_slot.base());
        if self.peek(port, sa_slot.base()) & regs::VALID == 0 || !sa.active {
            return Verdict::Drop(DropReason::NoEncodingSa);
        }

        let max = if sa.xpn { u64::MAX } else { u64::from(u32::MAX) };
        if sa.pn == 0 || sa.pn > max {
            return Verdict::Drop(DropReason::PnExhausted);
        }
        let pn = sa.pn;
        let next = if pn == max { 0 } else { pn + 1 };
        self.poke(port, sa_slot.base().offset(1), next as u32);
        self.poke(port, sa_slot.base().offset(2), (next >> 32) as u32);
        self.latch_events(port, slot, sa_slot, pn, next, pn == max);

        let sci = txsc
            .always_include_sci
            .then(|| Sci::new(secy.conf.mac_addr, secy.port_id));
        let encrypted = sa.confidential;
        let bypass = TagBypass::from_raw(
            self.peek(port, regs::secy_base(slot).add(regs::SECY_TAG_BYPASS_WORD)),
        );
        let secured = secure_tags(frame, bypass);
        let octets = secured.payload.len() as u64;
        // SecY level counts every SecTAG frame as protected; the channel and
        // association levels split protected and encrypted.
        self.update(port, CounterGroup::Secy { slot }, |c: &mut SecyCounters| {
            c.out_pkts_protected += 1;
            c.out_octets_protected += octets;
            if encrypted {
                c.out_pkts_encrypted += 1;
                c.out_octets_encrypted += octets;
            }
        });
        self.update(port, CounterGroup::TxSc { slot }, |c: &mut TxScCounters| {
            if encrypted {
                c.out_pkts_encrypted += 1;
                c.out_octets_encrypted += octets;
            } else {
                c.out_pkts_protected += 1;
                c.out_octets_protected += octets;
            }
        });
        self.update(port, sa_slot.counters(), |c: &mut TxSaCounters| {
            if encrypted {
                c.out_pkts_encrypted += 1;
            } else {
                c.out_pkts_protected += 1;
            }
        });

        Verdict::Transmit(secured.with_sectag(SecTag {
            an,
            pn,
            sci,
            encrypted,
            icv_ok: true,
        }))
    }

    /// Latches rollover and threshold status for enabled event types.
    fn latch_events(&self, port: PortNo, slot: u8, sa: SaSlot, pn: u64, next: u64, wrapped: bool) {
        let mask = EventMask::from_bits_truncate(self.peek(port, regs::EVENT_MASK));
        let mut raised = EventMask::empty();
        if wrapped && mask.contains(EventMask::ROLLOVER) {
            raised |= EventMask::ROLLOVER;
        }
        let threshold = self.peek(port, regs::SEQ_THRESHOLD);
        if threshold != 0
            && mask.contains(EventMask::SEQ_THRESHOLD)
            && (pn as u32) < threshold
            && (next as u32) >= threshold
        {
            raised |= EventMask::SEQ_THRESHOLD;
        }
        if raised.is_empty() {
            return;
        }
        debug!("sim: port {} {:?} raised {:?}", port, sa, raised);
        let status = self.peek(port, regs::EVENT_STATUS);
        self.poke(port, regs::EVENT_STATUS, status | raised.bits());
        self.poke(port, regs::EVENT_SA, regs::encode_event_sa(slot, sa.an()));
    }

    fn find_rx_sc(&self, port: PortNo, slot: u8, sci: Option<Sci>) -> Option<(u8, RxScRecord)> {
        (0..SCAN_SLOTS)
            .filter(|rx_slot| self.peek(port, regs::rx_sc_base(*rx_slot)) & regs::VALID != 0)
            .map(|rx_slot| {
                let record: RxScRecord = self.peek_record(port, regs::rx_sc_base(rx_slot));
                (rx_slot, record)
            })
            .find(|(_, record)| {
                record.secy_slot == slot && sci.map_or(true, |sci| sci == record.sci)
            })
    }

    fn validate(&self, port: PortNo, slot: u8, frame: &Frame) -> Verdict {
        let secy: SecyRecord = self.peek_record(port, regs::secy_base(slot));
        if !secy.controlled {
            return Verdict::Drop(DropReason::ControlledPortDisabled);
        }
        let secy_group = CounterGroup::Secy { slot };

        let Some(sectag) = frame.sectag else {
            if secy.conf.validate_frames == ValidateFrames::Strict {
                self.update(port, secy_group, |c: &mut SecyCounters| c.in_pkts_no_tag += 1);
                return Verdict::Drop(DropReason::Untagged);
            }
            self.update(port, secy_group, |c: &mut SecyCounters| c.in_pkts_untagged += 1);
            return Verdict::Deliver(frame.clone());
        };

        let Some((rx_slot, rx)) = self.find_rx_sc(port, slot, sectag.sci) else {
            self.update(port, secy_group, |c: &mut SecyCounters| {
                if sectag.sci.is_some() {
                    c.in_pkts_unknown_sci += 1
                } else {
                    c.in_pkts_no_sci += 1
                }
            });
            return match secy.conf.validate_frames {
                ValidateFrames::Disabled => Verdict::Deliver(strip(frame)),
                _ => Verdict::Drop(DropReason::UnknownSci),
            };
        };
        let conf = rx.conf;
        let sc_group = CounterGroup::RxSc { rx_slot };
        let sa_slot = SaSlot::Rx {
            rx_slot,
            an: sectag.an,
        };

        let sa: SaRecord = self.peek_record(port, sa_slot.base());
        if self.peek(port, sa_slot.base()) & regs::VALID == 0 || !sa.active {
            let strict = conf.validate_frames == ValidateFrames::Strict || sectag.encrypted;
            self.update(port, sc_group, |c: &mut RxScCounters| {
                if strict {
                    c.in_pkts_not_using_sa += 1
                } else {
                    c.in_pkts_unused_sa += 1
                }
            });
            self.update(port, sa_slot.counters(), |c: &mut RxSaCounters| {
                if strict {
                    c.in_pkts_not_using_sa += 1
                } else {
                    c.in_pkts_unused_sa += 1
                }
            });
            return if strict {
                Verdict::Drop(DropReason::NotUsingSa)
            } else {
                Verdict::Deliver(strip(frame))
            };
        }

        if sa.replay_protect && sectag.pn < sa.pn {
            self.update(port, sc_group, |c: &mut RxScCounters| c.in_pkts_late += 1);
            return Verdict::Drop(DropReason::Late);
        }

        if conf.validate_frames == ValidateFrames::Disabled {
            self.update(port, sc_group, |c: &mut RxScCounters| c.in_pkts_unchecked += 1);
            return Verdict::Deliver(strip(frame));
        }

        if !sectag.icv_ok {
            let strict = conf.validate_frames == ValidateFrames::Strict || sectag.encrypted;
            self.update(port, sc_group, |c: &mut RxScCounters| {
                if strict {
                    c.in_pkts_not_valid += 1
                } else {
                    c.in_pkts_invalid += 1
                }
            });
            self.update(port, sa_slot.counters(), |c: &mut RxSaCounters| {
                if strict {
                    c.in_pkts_not_valid += 1
                } else {
                    c.in_pkts_invalid += 1
                }
            });
            return if strict {
                Verdict::Drop(DropReason::NotValid)
            } else {
                Verdict::Deliver(strip(frame))
            };
        }

        let octets = frame.payload.len() as u64;
        let delayed = sectag.pn < sa.pn;
        self.update(port, sc_group, |c: &mut RxScCounters| {
            if delayed {
                c.in_pkts_delayed += 1;
            } else {
                c.in_pkts_ok += 1;
            }
            if sectag.encrypted {
                c.in_octets_decrypted += octets;
            } else {
                c.in_octets_validated += octets;
            }
        });
        self.update(port, sa_slot.counters(), |c: &mut RxSaCounters| c.in_pkts_ok += 1);
        self.update(port, secy_group, |c: &mut SecyCounters| {
            if sectag.encrypted {
                c.in_octets_decrypted += octets;
            } else {
                c.in_octets_validated += octets;
            }
        });

        // Replay settings are the SA's own, fixed when it was installed.
        let window = if sa.replay_protect {
            u64::from(sa.replay_window)
        } else {
            0
        };
        let lowest = sectag.pn.saturating_add(1).saturating_sub(window);
        if lowest > sa.pn {
            self.poke(port, sa_slot.base().offset(1), lowest as u32);
            self.poke(port, sa_slot.base().offset(2), (lowest >> 32) as u32);
        }
        Verdict::Deliver(strip(frame))
    }

    fn update<C: CounterSet>(&self, port: PortNo, group: CounterGroup, f: impl FnOnce(&mut C)) {
        let raw: Vec<u64> = (0..group.field_count())
            .map(|field| self.peek_u64(port, regs::counter_csrs(group, field)))
            .collect();
        let mut counters = C::from_raw(&raw);
        f(&mut counters);
        for (field, value) in counters.to_raw().into_iter().enumerate() {
            self.poke_u64(port, regs::counter_csrs(group, field), value);
        }
    }

    /// Interface counters of the port a frame was steered to: the SecY's
    /// controlled port, or the uncontrolled port for frames passed around
    /// or dropped by classification. Controlled-port counts see the
    /// unprotected frame.
    fn count_port(
        &self,
        port: PortNo,
        direction: Direction,
        resolved: Resolved,
        frame: &Frame,
        verdict: &Verdict,
    ) {
        let group = match resolved {
            Resolved::Controlled(slot) => CounterGroup::Controlled { slot },
            Resolved::Pass | Resolved::Drop(_) => CounterGroup::Uncontrolled,
        };
        let ingress = direction == Direction::Ingress;
        self.update(port, group, |c: &mut PortCounters| match verdict {
            Verdict::Transmit(_) => count_frame(c, frame, false),
            Verdict::Deliver(out) => count_frame(c, out, true),
            Verdict::Drop(DropReason::TooLong) => c.if_out_errors += 1,
            Verdict::Drop(DropReason::NotValid) => c.if_in_errors += 1,
            Verdict::Drop(_) if ingress => c.if_in_discards += 1,
            Verdict::Drop(_) => c.if_out_discards += 1,
        });
    }

    fn count_mac(&self, port: PortNo, block: MacBlock, frame: &Frame, tx: bool) {
        let octets = frame.wire_len() as u64;
        let broadcast = frame.dest_mac == MacAddress::BROADCAST;
        let multicast = !broadcast && frame.dest_mac.is_multicast();
        self.update(port, CounterGroup::Mac(block), |c: &mut MacCounters| {
            let (unicast_pkts, multicast_pkts, broadcast_pkts, total) = if tx {
                (
                    &mut c.tx_unicast,
                    &mut c.tx_multicast,
                    &mut c.tx_broadcast,
                    &mut c.tx_octets,
                )
            } else {
                (
                    &mut c.rx_unicast,
                    &mut c.rx_multicast,
                    &mut c.rx_broadcast,
                    &mut c.rx_octets,
                )
            };
            if broadcast {
                *broadcast_pkts += 1;
            } else if multicast {
                *multicast_pkts += 1;
            } else {
                *unicast_pkts += 1;
            }
            *total += octets;
        });
    }

    /// Fills the one-shot capture buffer if armed for `direction`.
    fn capture(&self, port: PortNo, direction: FrameCapture, frame: &Frame) {
        let ctrl = self.peek(port, regs::CAPTURE_CTRL);
        if ctrl & regs::CAPTURE_READY != 0 || FrameCapture::from_raw(ctrl) != direction {
            return;
        }
        let bytes = frame.to_bytes();
        for (i, chunk) in bytes.chunks(4).take(regs::CAPTURE_WORDS as usize).enumerate() {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.poke(port, regs::CAPTURE_DATA.add(i as u32), u32::from_be_bytes(word));
        }
        self.poke(port, regs::CAPTURE_LEN, bytes.len() as u32);
        self.poke(port, regs::CAPTURE_CTRL, regs::CAPTURE_READY);
    }
}

/// Adds `frame` to the in or out half of a port counter group.
fn count_frame(c: &mut PortCounters, frame: &Frame, inbound: bool) {
    let octets = frame.wire_len() as u64;
    let broadcast = frame.dest_mac == MacAddress::BROADCAST;
    let multicast = !broadcast && frame.dest_mac.is_multicast();
    let (octet_total, unicast_pkts, multicast_pkts, broadcast_pkts) = if inbound {
        (
            &mut c.if_in_octets,
            &mut c.if_in_ucast_pkts,
            &mut c.if_in_multicast_pkts,
            &mut c.if_in_broadcast_pkts,
        )
    } else {
        (
            &mut c.if_out_octets,
            &mut c.if_out_ucast_pkts,
            &mut c.if_out_multicast_pkts,
            &mut c.if_out_broadcast_pkts,
        )
    };
    if broadcast {
        *broadcast_pkts += 1;
    } else if multicast {
        *multicast_pkts += 1;
    } else {
        *unicast_pkts += 1;
    }
    *octet_total += octets;
}

/// Moves the VLAN tags not kept in clear by `bypass` into the secured data,
/// outermost first.
fn secure_tags(frame: &Frame, bypass: TagBypass) -> Frame {
    let mut out = frame.clone();
    let mut secured = Vec::new();
    let tags = [&mut out.vlan, &mut out.inner_vlan];
    for tag in tags.into_iter().filter(|tag| tag.is_some()).skip(bypass.clear_tags()) {
        if let Some(vid) = tag.take() {
            secured.extend_from_slice(&EtherType::VLAN.as_u16().to_be_bytes());
            secured.extend_from_slice(&vid.as_u16().to_be_bytes());
        }
    }
    if !secured.is_empty() {
        secured.extend_from_slice(&out.payload);
        out.payload = secured;
    }
    out
}

fn strip(frame: &Frame) -> Frame {
    let mut out = frame.clone();
    out.sectag = None;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use macsec_hal::conf::SecyConf;
    use macsec_hal::{MacsecDriver, PhyFamily, PollConfig, PortInfo, RegisterDriver};
    use macsec_types::{AssocNum, EtherType, Sak, VlanId};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const PORT: PortNo = PortNo::new(3);

    fn setup(family: PhyFamily) -> (Arc<SimPhy>, RegisterDriver) {
        let sim = Arc::new(SimPhy::new());
        let driver = RegisterDriver::new(
            PortInfo::new(family, true),
            sim.clone(),
            PollConfig::default(),
        );
        driver
            .init_set(
                PORT,
                &InitConf {
                    enable: true,
                    ..Default::default()
                },
            )
            .unwrap();
        (sim, driver)
    }

    fn local() -> MacAddress {
        "00:00:5e:00:53:01".parse().unwrap()
    }

    fn peer() -> MacAddress {
        "00:00:5e:00:53:02".parse().unwrap()
    }

    fn ip_frame() -> Frame {
        Frame::new(peer(), local(), EtherType::IPV4).with_payload(vec![0xab; 46])
    }

    fn secy(driver: &RegisterDriver, conf: SecyConf) {
        driver
            .secy_write(
                PORT,
                0,
                &SecyRecord {
                    conf,
                    port_id: 1,
                    controlled: true,
                },
            )
            .unwrap();
        for direction in [Direction::Egress, Direction::Ingress] {
            driver
                .rule_write(
                    PORT,
                    0,
                    direction,
                    MatchAction::ControlledPort,
                    &MatchPattern::default(),
                )
                .unwrap();
        }
    }

    fn tx_sa(driver: &RegisterDriver, pn: u64, xpn: bool) {
        let conf = SecyConf {
            mac_addr: local(),
            ..Default::default()
        };
        driver
            .tx_sc_write(PORT, 0, &TxScConf::from_secy(&conf))
            .unwrap();
        let key = Sak::new(&[7; 16], [1; 16]).unwrap();
        let sa = SaSlot::Tx {
            secy_slot: 0,
            an: AssocNum::AN1,
        };
        let record = SaRecord {
            active: true,
            confidential: true,
            xpn,
            pn,
            ..Default::default()
        };
        driver.sa_install(PORT, sa, &record, &key).unwrap();
        driver
            .encoding_sa_write(PORT, 0, Some(AssocNum::AN1))
            .unwrap();
    }

    #[test]
    fn test_engine_disabled_passes_through() {
        let sim = SimPhy::new();
        let frame = ip_frame();
        assert_eq!(sim.egress(PORT, &frame), Verdict::Transmit(frame));
    }

    #[test]
    fn test_default_policy_drops_unmatched() {
        let (sim, _driver) = setup(PhyFamily::Viper);
        assert_eq!(
            sim.egress(PORT, &ip_frame()),
            Verdict::Drop(DropReason::DefaultPolicy)
        );
    }

    #[test]
    fn test_controlled_port_gate() {
        let (sim, driver) = setup(PhyFamily::Viper);
        secy(
            &driver,
            SecyConf {
                mac_addr: local(),
                ..Default::default()
            },
        );
        driver.controlled_port_write(PORT, 0, false).unwrap();
        assert_eq!(
            sim.egress(PORT, &ip_frame()),
            Verdict::Drop(DropReason::ControlledPortDisabled)
        );
    }

    #[test]
    fn test_egress_consumes_packet_numbers() {
        let (sim, driver) = setup(PhyFamily::Viper);
        secy(
            &driver,
            SecyConf {
                mac_addr: local(),
                ..Default::default()
            },
        );
        tx_sa(&driver, 1, false);

        let verdict = sim.egress(PORT, &ip_frame());
        let sectag = verdict.frame().and_then(|f| f.sectag).unwrap();
        assert_eq!(sectag.pn, 1);
        assert_eq!(sectag.an, AssocNum::AN1);
        assert!(sectag.encrypted);

        let sa = SaSlot::Tx {
            secy_slot: 0,
            an: AssocNum::AN1,
        };
        assert_eq!(driver.sa_pn_read(PORT, sa).unwrap(), 2);
        let counters =
            TxSaCounters::from_raw(&driver.counters_read(PORT, sa.counters()).unwrap());
        assert_eq!(counters.out_pkts_encrypted, 1);
        let line = MacCounters::from_raw(
            &driver
                .counters_read(PORT, CounterGroup::Mac(MacBlock::Line))
                .unwrap(),
        );
        assert_eq!(line.tx_unicast, 1);
    }

    #[test]
    fn test_rollover_latched_only_when_enabled() {
        let (sim, driver) = setup(PhyFamily::Viper);
        secy(
            &driver,
            SecyConf {
                mac_addr: local(),
                ..Default::default()
            },
        );
        tx_sa(&driver, u64::from(u32::MAX), false);
        assert!(!sim.egress(PORT, &ip_frame()).is_drop());
        assert_eq!(driver.event_status_read(PORT).unwrap(), EventMask::empty());
        assert_eq!(
            sim.egress(PORT, &ip_frame()),
            Verdict::Drop(DropReason::PnExhausted)
        );

        tx_sa(&driver, u64::from(u32::MAX), false);
        driver.event_mask_write(PORT, EventMask::ROLLOVER).unwrap();
        assert!(!sim.egress(PORT, &ip_frame()).is_drop());
        assert_eq!(driver.event_status_read(PORT).unwrap(), EventMask::ROLLOVER);
        assert_eq!(driver.event_sa_read(PORT).unwrap(), Some((0, AssocNum::AN1)));
    }

    #[test]
    fn test_threshold_crossing() {
        let (sim, driver) = setup(PhyFamily::Malibu25g);
        secy(
            &driver,
            SecyConf {
                mac_addr: local(),
                cipher_suite: macsec_types::CipherSuite::GcmAesXpn128,
                ..Default::default()
            },
        );
        driver.seq_threshold_write(PORT, 3).unwrap();
        driver
            .event_mask_write(PORT, EventMask::SEQ_THRESHOLD)
            .unwrap();
        tx_sa(&driver, 1, true);
        sim.egress(PORT, &ip_frame());
        assert_eq!(driver.event_status_read(PORT).unwrap(), EventMask::empty());
        sim.egress(PORT, &ip_frame());
        assert_eq!(
            driver.event_status_read(PORT).unwrap(),
            EventMask::SEQ_THRESHOLD
        );
    }

    #[test]
    fn test_mtu_drop_counts_too_long() {
        let (sim, driver) = setup(PhyFamily::Viper);
        secy(
            &driver,
            SecyConf {
                mac_addr: local(),
                ..Default::default()
            },
        );
        tx_sa(&driver, 1, false);
        driver.mtu_write(PORT, 64).unwrap();
        let big = ip_frame().with_payload(vec![0; 200]);
        assert_eq!(sim.egress(PORT, &big), Verdict::Drop(DropReason::TooLong));
        let counters = SecyCounters::from_raw(
            &driver
                .counters_read(PORT, CounterGroup::Secy { slot: 0 })
                .unwrap(),
        );
        assert_eq!(counters.out_pkts_too_long, 1);
    }

    #[test]
    fn test_ingress_replay_window() {
        let (sim, driver) = setup(PhyFamily::Viper);
        let conf = SecyConf {
            mac_addr: local(),
            replay_protect: true,
            replay_window: 2,
            ..Default::default()
        };
        secy(&driver, conf);
        let sci = Sci::new(peer(), 1);
        driver
            .rx_sc_write(
                PORT,
                0,
                &RxScRecord {
                    secy_slot: 0,
                    sci,
                    conf: macsec_hal::RxScConf::from_secy(&conf),
                },
            )
            .unwrap();
        let sa = SaSlot::Rx {
            rx_slot: 0,
            an: AssocNum::AN0,
        };
        let record = SaRecord {
            active: true,
            replay_protect: true,
            replay_window: 2,
            pn: 10,
            ..Default::default()
        };
        driver
            .sa_install(PORT, sa, &record, &Sak::new(&[3; 16], [4; 16]).unwrap())
            .unwrap();

        let tagged = |pn: u64| {
            Frame::new(local(), peer(), EtherType::IPV4).with_sectag(SecTag {
                an: AssocNum::AN0,
                pn,
                sci: Some(sci),
                encrypted: true,
                icv_ok: true,
            })
        };
        assert_eq!(sim.ingress(PORT, &tagged(5)), Verdict::Drop(DropReason::Late));
        let delivered = sim.ingress(PORT, &tagged(20));
        assert_eq!(delivered.frame().map(|f| f.sectag), Some(None));
        assert_eq!(driver.sa_pn_read(PORT, sa).unwrap(), 19);

        let rx = RxScCounters::from_raw(
            &driver
                .counters_read(PORT, CounterGroup::RxSc { rx_slot: 0 })
                .unwrap(),
        );
        assert_eq!(rx.in_pkts_late, 1);
        assert_eq!(rx.in_pkts_ok, 1);
    }

    #[test]
    fn test_capture_is_one_shot() {
        let (sim, driver) = setup(PhyFamily::Viper);
        driver
            .default_action_write(PORT, &DefaultActionPolicy::all(DefaultAction::Bypass))
            .unwrap();
        driver.capture_arm(PORT, FrameCapture::Egress).unwrap();
        let frame = ip_frame();
        sim.egress(PORT, &frame);
        sim.egress(PORT, &ip_frame().with_payload(vec![1; 10]));
        let captured = driver.capture_read(PORT, 12).unwrap().unwrap();
        assert_eq!(captured.length, frame.to_bytes().len());
        assert_eq!(captured.bytes, frame.to_bytes()[..12].to_vec());
        assert_eq!(driver.capture_read(PORT, 12).unwrap(), None);
    }

    fn port_counters(driver: &RegisterDriver, group: CounterGroup) -> PortCounters {
        PortCounters::from_raw(&driver.counters_read(PORT, group).unwrap())
    }

    #[test]
    fn test_protected_frames_count_on_controlled_port() {
        let (sim, driver) = setup(PhyFamily::Viper);
        secy(
            &driver,
            SecyConf {
                mac_addr: local(),
                ..Default::default()
            },
        );
        tx_sa(&driver, 1, false);

        let frame = ip_frame();
        let sent = sim.egress(PORT, &frame);
        let on_line = sent.frame().unwrap();

        let controlled = port_counters(&driver, CounterGroup::Controlled { slot: 0 });
        assert_eq!(controlled.if_out_ucast_pkts, 1);
        assert_eq!(controlled.if_out_octets, frame.wire_len() as u64);
        let common = port_counters(&driver, CounterGroup::Common);
        assert_eq!(common.if_out_ucast_pkts, 1);
        assert_eq!(common.if_out_octets, on_line.wire_len() as u64);
        assert!(common.if_out_octets > controlled.if_out_octets);
        assert_eq!(
            port_counters(&driver, CounterGroup::Uncontrolled),
            PortCounters::default()
        );

        driver.mtu_write(PORT, 64).unwrap();
        sim.egress(PORT, &ip_frame().with_payload(vec![0; 200]));
        assert_eq!(
            port_counters(&driver, CounterGroup::Controlled { slot: 0 }).if_out_errors,
            1
        );
    }

    #[test]
    fn test_bypassed_frames_count_on_uncontrolled_port() {
        let (sim, driver) = setup(PhyFamily::Viper);
        driver
            .default_action_write(PORT, &DefaultActionPolicy::all(DefaultAction::Bypass))
            .unwrap();
        let broadcast = Frame::new(MacAddress::BROADCAST, peer(), EtherType::IPV4);
        assert!(!sim.egress(PORT, &ip_frame()).is_drop());
        assert!(!sim.ingress(PORT, &broadcast).is_drop());

        let uncontrolled = port_counters(&driver, CounterGroup::Uncontrolled);
        assert_eq!(uncontrolled.if_out_ucast_pkts, 1);
        assert_eq!(uncontrolled.if_in_broadcast_pkts, 1);
        let common = port_counters(&driver, CounterGroup::Common);
        assert_eq!(common.if_out_ucast_pkts, 1);
        assert_eq!(common.if_in_broadcast_pkts, 1);

        driver
            .default_action_write(PORT, &DefaultActionPolicy::all(DefaultAction::Drop))
            .unwrap();
        sim.egress(PORT, &ip_frame());
        sim.ingress(PORT, &ip_frame());
        let uncontrolled = port_counters(&driver, CounterGroup::Uncontrolled);
        assert_eq!(uncontrolled.if_out_discards, 1);
        assert_eq!(uncontrolled.if_in_discards, 1);
        // the line side still saw the dropped ingress frame
        assert_eq!(port_counters(&driver, CounterGroup::Common).if_in_ucast_pkts, 1);
    }

    #[test]
    fn test_tag_bypass_keeps_tags_in_clear() {
        let (sim, driver) = setup(PhyFamily::Viper);
        secy(
            &driver,
            SecyConf {
                mac_addr: local(),
                ..Default::default()
            },
        );
        tx_sa(&driver, 1, false);
        let outer = VlanId::new(100).unwrap();
        let inner = VlanId::new(200).unwrap();
        let frame = ip_frame().with_vlan(outer).with_inner_vlan(inner);

        let sent = sim.egress(PORT, &frame);
        let out = sent.frame().unwrap();
        assert_eq!((out.vlan, out.inner_vlan), (None, None));
        assert_eq!(&out.payload[..8], &[0x81, 0x00, 0x00, 100, 0x81, 0x00, 0x00, 200]);

        driver.tag_bypass_write(PORT, 0, TagBypass::Tag).unwrap();
        let sent = sim.egress(PORT, &frame);
        let out = sent.frame().unwrap();
        assert_eq!((out.vlan, out.inner_vlan), (Some(outer), None));
        assert_eq!(&out.payload[..4], &[0x81, 0x00, 0x00, 200]);

        driver.tag_bypass_write(PORT, 0, TagBypass::Header).unwrap();
        let sent = sim.egress(PORT, &frame);
        let out = sent.frame().unwrap();
        assert_eq!((out.vlan, out.inner_vlan), (Some(outer), Some(inner)));
        assert_eq!(out.payload, frame.payload);
    }
}
