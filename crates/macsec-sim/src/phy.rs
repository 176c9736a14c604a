use std::collections::HashMap;

use log::{debug, trace};
use macsec_hal::regs::{self, RegisterRecord};
use macsec_hal::types::{CsrBlock, RxSaBlock, TxSaBlock};
use macsec_hal::{PhyStatus, PortNo, RawCsr, RegisterTransport};
use parking_lot::Mutex;

struct Fault {
    remaining: u64,
    status: PhyStatus,
}

#[derive(Default)]
struct RegFile {
    regs: HashMap<(PortNo, RawCsr), u32>,
    /// Polls left before SA_BUSY drops, per SA control word.
    busy: HashMap<(PortNo, RawCsr), u32>,
    key_install_latency: u32,
    hang_key_install: bool,
    fault: Option<Fault>,
    accesses: u64,
}

impl RegFile {
    fn get(&self, port: PortNo, csr: RawCsr) -> u32 {
        self.regs.get(&(port, csr)).copied().unwrap_or(0)
    }

    fn check_fault(&mut self) -> Result<(), PhyStatus> {
        self.accesses += 1;
        match &mut self.fault {
            Some(fault) if fault.remaining == 0 => Err(fault.status),
            Some(fault) => {
                fault.remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn is_sa_ctrl(csr: RawCsr) -> bool {
    fn in_table<B: CsrBlock>(csr: RawCsr) -> bool {
        csr.mmd == B::MMD && csr.addr >= B::BASE && (csr.addr - B::BASE) % regs::SA_STRIDE == 0
    }
    in_table::<TxSaBlock>(csr) || in_table::<RxSaBlock>(csr)
}

/// Emulated PHY register file shared by every port on a board.
#[derive(Default)]
pub struct SimPhy {
    file: Mutex<RegFile>,
}

impl SimPhy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of polls an SA key load stays busy. Zero completes at once.
    pub fn set_key_install_latency(&self, polls: u32) {
        self.file.lock().key_install_latency = polls;
    }

    /// Keeps SA_BUSY set forever after a key load is triggered.
    pub fn hang_key_install(&self, hang: bool) {
        self.file.lock().hang_key_install = hang;
    }

    /// Lets `accesses` more register accesses succeed, then fails every
    /// access with `status` until [`clear_faults`](Self::clear_faults).
    pub fn fail_after(&self, accesses: u64, status: PhyStatus) {
        debug!("sim: failing accesses after {} more with {}", accesses, status);
        self.file.lock().fault = Some(Fault {
            remaining: accesses,
            status,
        });
    }

    pub fn clear_faults(&self) {
        self.file.lock().fault = None;
    }

    /// Total register accesses seen through the transport.
    pub fn access_count(&self) -> u64 {
        self.file.lock().accesses
    }

    /// Backdoor read: no side effects, never faulted.
    pub fn peek(&self, port: PortNo, csr: impl Into<RawCsr>) -> u32 {
        self.file.lock().get(port, csr.into())
    }

    /// Backdoor write: no side effects, never faulted.
    pub fn poke(&self, port: PortNo, csr: impl Into<RawCsr>, value: u32) {
        self.file.lock().regs.insert((port, csr.into()), value);
    }

    pub fn peek_record<R: RegisterRecord>(&self, port: PortNo, base: impl Into<RawCsr>) -> R {
        let base = base.into();
        let file = self.file.lock();
        let words: Vec<u32> = (0..R::WORDS).map(|i| file.get(port, base.offset(i))).collect();
        R::from_words(&words)
    }

    /// Writes a 64-bit lo/hi pair.
    pub fn poke_u64(&self, port: PortNo, (lo, hi): (RawCsr, RawCsr), value: u64) {
        let mut file = self.file.lock();
        file.regs.insert((port, lo), value as u32);
        file.regs.insert((port, hi), (value >> 32) as u32);
    }

    /// Reads a 64-bit lo/hi pair.
    pub fn peek_u64(&self, port: PortNo, (lo, hi): (RawCsr, RawCsr)) -> u64 {
        let file = self.file.lock();
        (u64::from(file.get(port, hi)) << 32) | u64::from(file.get(port, lo))
    }
}

impl RegisterTransport for SimPhy {
    fn read(&self, port: PortNo, csr: RawCsr) -> Result<u32, PhyStatus> {
        let mut file = self.file.lock();
        file.check_fault()?;
        let value = file.get(port, csr);
        if is_sa_ctrl(csr) && value & regs::SA_BUSY != 0 && !file.hang_key_install {
            let left = file.busy.get(&(port, csr)).copied().unwrap_or(0);
            if left == 0 {
                let value = value & !regs::SA_BUSY;
                file.regs.insert((port, csr), value);
                file.busy.remove(&(port, csr));
                trace!("sim: port {} {} key loaded", port, csr);
                return Ok(value);
            }
            file.busy.insert((port, csr), left - 1);
        }
        Ok(value)
    }

    fn write(&self, port: PortNo, csr: RawCsr, value: u32) -> Result<(), PhyStatus> {
        let mut file = self.file.lock();
        file.check_fault()?;
        if csr == regs::EVENT_STATUS.raw() {
            let current = file.get(port, csr);
            file.regs.insert((port, csr), current & !value);
            return Ok(());
        }
        if is_sa_ctrl(csr) && value & regs::SA_INSTALL != 0 {
            let latency = file.key_install_latency;
            file.busy.insert((port, csr), latency);
            let value = (value & !regs::SA_INSTALL) | regs::SA_BUSY;
            file.regs.insert((port, csr), value);
            return Ok(());
        }
        if is_sa_ctrl(csr) {
            file.busy.remove(&(port, csr));
        }
        file.regs.insert((port, csr), value);
        Ok(())
    }
}
