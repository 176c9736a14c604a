//! Statistics groups per SecY, channel, association and MAC block, plus
//! the 802.1AE controlled, uncontrolled and common port counters.

use super::board::{MacsecBoard, PortHw, SOURCE};
use super::types::{SecyEntry, SecyId};
use crate::debug_log;
use macsec_hal::{
    CounterGroup, CounterSet, MacBlock, MacCounters, MacsecError, MacsecResult, PortCounters,
    PortNo, RxSaCounters, RxScCounters, SecyCounters, TxSaCounters, TxScCounters,
};
use macsec_types::{AssocNum, Sci};

#[derive(Debug, Clone, Copy)]
enum Target {
    Secy,
    Controlled,
    TxSc,
    TxSa(AssocNum),
    RxSc(Sci),
    RxSa(Sci, AssocNum),
}

/// Hardware counter group of a registry object, NotFound when absent.
fn locate(id: SecyId, secy: &SecyEntry, target: Target) -> MacsecResult<CounterGroup> {
    let slot = secy.slot;
    let tx = || {
        secy.tx_sc
            .as_ref()
            .ok_or_else(|| MacsecError::not_found(format!("Tx SC on SecY {}", id)))
    };
    let rx = |sci: Sci| {
        secy.rx_scs
            .get(&sci)
            .ok_or_else(|| MacsecError::not_found(format!("Rx SC {} on SecY {}", sci, id)))
    };
    match target {
        Target::Secy => Ok(CounterGroup::Secy { slot }),
        Target::Controlled => Ok(CounterGroup::Controlled { slot }),
        Target::TxSc => tx().map(|_| CounterGroup::TxSc { slot }),
        Target::TxSa(an) => {
            tx()?
                .sas
                .get(an)
                .ok_or_else(|| MacsecError::not_found(format!("Tx SA {} on SecY {}", an, id)))?;
            Ok(CounterGroup::TxSa { slot, an })
        }
        Target::RxSc(sci) => rx(sci).map(|rx| CounterGroup::RxSc {
            rx_slot: rx.rx_slot,
        }),
        Target::RxSa(sci, an) => {
            let rx = rx(sci)?;
            rx.sas.get(an).ok_or_else(|| {
                MacsecError::not_found(format!("Rx SA {} of {} on SecY {}", an, sci, id))
            })?;
            Ok(CounterGroup::RxSa {
                rx_slot: rx.rx_slot,
                an,
            })
        }
    }
}

fn read<C: CounterSet>(hw: &PortHw, group: CounterGroup) -> MacsecResult<C> {
    Ok(C::from_raw(&hw.driver.counters_read(hw.port, group)?))
}

impl MacsecBoard {
    fn counters_get<C: CounterSet>(&self, id: SecyId, target: Target) -> MacsecResult<C> {
        self.with_secy(id, |hw, secy| read(hw, locate(id, secy, target)?))
    }

    fn counters_clear(&self, id: SecyId, target: Target) -> MacsecResult<()> {
        self.with_secy(id, |hw, secy| {
            let group = locate(id, secy, target)?;
            hw.driver.counters_clear(hw.port, group)?;
            debug_log!(SOURCE, secy = %id, group = ?group, "counters cleared");
            Ok(())
        })
    }

    pub fn secy_counters_get(&self, id: SecyId) -> MacsecResult<SecyCounters> {
        self.counters_get(id, Target::Secy)
    }

    pub fn secy_counters_clear(&self, id: SecyId) -> MacsecResult<()> {
        self.counters_clear(id, Target::Secy)
    }

    /// Interface counters of the SecY's controlled port, counted on the
    /// unprotected side.
    pub fn controlled_counters_get(&self, id: SecyId) -> MacsecResult<PortCounters> {
        self.counters_get(id, Target::Controlled)
    }

    pub fn controlled_counters_clear(&self, id: SecyId) -> MacsecResult<()> {
        self.counters_clear(id, Target::Controlled)
    }

    pub fn tx_sc_counters_get(&self, id: SecyId) -> MacsecResult<TxScCounters> {
        self.counters_get(id, Target::TxSc)
    }

    pub fn tx_sc_counters_clear(&self, id: SecyId) -> MacsecResult<()> {
        self.counters_clear(id, Target::TxSc)
    }

    pub fn tx_sa_counters_get(&self, id: SecyId, an: AssocNum) -> MacsecResult<TxSaCounters> {
        self.counters_get(id, Target::TxSa(an))
    }

    pub fn tx_sa_counters_clear(&self, id: SecyId, an: AssocNum) -> MacsecResult<()> {
        self.counters_clear(id, Target::TxSa(an))
    }

    pub fn rx_sc_counters_get(&self, id: SecyId, sci: Sci) -> MacsecResult<RxScCounters> {
        self.counters_get(id, Target::RxSc(sci))
    }

    pub fn rx_sc_counters_clear(&self, id: SecyId, sci: Sci) -> MacsecResult<()> {
        self.counters_clear(id, Target::RxSc(sci))
    }

    pub fn rx_sa_counters_get(
        &self,
        id: SecyId,
        sci: Sci,
        an: AssocNum,
    ) -> MacsecResult<RxSaCounters> {
        self.counters_get(id, Target::RxSa(sci, an))
    }

    pub fn rx_sa_counters_clear(&self, id: SecyId, sci: Sci, an: AssocNum) -> MacsecResult<()> {
        self.counters_clear(id, Target::RxSa(sci, an))
    }

    /// Host- or line-side MAC counters. Available whenever the port has a
    /// MACsec engine, on or off.
    pub fn mac_counters_get(&self, port: PortNo, block: MacBlock) -> MacsecResult<MacCounters> {
        self.with_port(port, |entry| read(&entry.hw, CounterGroup::Mac(block)))
    }

    pub fn mac_counters_clear(&self, port: PortNo, block: MacBlock) -> MacsecResult<()> {
        self.with_port(port, |entry| {
            entry.hw.driver.counters_clear(port, CounterGroup::Mac(block))
        })
    }

    /// Frames passed around every SecY, or dropped before reaching one.
    pub fn uncontrolled_counters_get(&self, port: PortNo) -> MacsecResult<PortCounters> {
        self.with_port(port, |entry| read(&entry.hw, CounterGroup::Uncontrolled))
    }

    pub fn uncontrolled_counters_clear(&self, port: PortNo) -> MacsecResult<()> {
        self.port_counters_clear(port, CounterGroup::Uncontrolled)
    }

    /// Every frame crossing the line side of the engine.
    pub fn common_counters_get(&self, port: PortNo) -> MacsecResult<PortCounters> {
        self.with_port(port, |entry| read(&entry.hw, CounterGroup::Common))
    }

    pub fn common_counters_clear(&self, port: PortNo) -> MacsecResult<()> {
        self.port_counters_clear(port, CounterGroup::Common)
    }

    fn port_counters_clear(&self, port: PortNo, group: CounterGroup) -> MacsecResult<()> {
        self.with_port(port, |entry| {
            entry.hw.driver.counters_clear(port, group)?;
            debug_log!(SOURCE, port = %port, group = ?group, "counters cleared");
            Ok(())
        })
    }
}
