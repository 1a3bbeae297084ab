//! Native register access for a traced MicroBlaze/Linux process.
//!
//! Everything here follows the same shape: resolve the OS thread id, read
//! the live general register block, marshal words between it and the host's
//! register cache, and (for stores) write the block back. Tracing failures
//! are reported as warnings and abort the single transfer; registers already
//! copied stay copied.

use log::trace;
use log::warn;

use crate::arch;
use crate::arch::regnum;
use crate::arch::reg::Gregs;
use crate::arch::MicroBlaze;
use crate::arch::REGISTER_SIZE;
use crate::target::Auxv;
use crate::target::BreakpointSite;
use crate::target::Memory;
use crate::target::NativeOps;
use crate::target::RegCache;
use crate::target::RegSelector;
use crate::target::TargetResult;
use crate::target::AT_HWCAP;
use crate::tdep;
use crate::trace::Pid;
use crate::trace::Ptid;
use crate::trace::TraceError;
use crate::trace::Tracer;

/// The MicroBlaze/Linux native backend.
///
/// Holds the tracer and the identity of the inferior it is attached to;
/// register values themselves are never retained between calls.
#[derive(Debug)]
pub struct MicroBlazeLinuxNat<T> {
    tracer: T,
    ptid: Ptid,
}

impl<T: Tracer> MicroBlazeLinuxNat<T> {
    /// Backend for the inferior identified by `ptid`, driven through
    /// `tracer`.
    pub fn new(tracer: T, ptid: Ptid) -> Self {
        MicroBlazeLinuxNat { tracer, ptid }
    }

    /// Switch the backend to a different inferior thread.
    pub fn set_inferior(&mut self, ptid: Ptid) {
        self.ptid = ptid;
    }

    /// The inferior currently being operated on.
    pub fn inferior(&self) -> Ptid {
        self.ptid
    }

    /// TLS base pointer for thread `lwpid`, adjusted for libthread_db.
    ///
    /// `idx` is the bias from the thread pointer to the beginning of the
    /// thread descriptor; the thread-debugging library expects it already
    /// subtracted from the raw tracing result.
    pub fn thread_area(&mut self, lwpid: Pid, idx: i32) -> Result<u64, TraceError> {
        let base = self.tracer.get_thread_area(lwpid)?;
        Ok(base.wrapping_sub(idx as i64 as u64))
    }

    /// Fetch every general register into the cache.
    fn fetch_regs(&mut self, cache: &mut dyn RegCache) {
        let tid = self.ptid.resolve();
        let regs = match self.tracer.getregs(tid) {
            Ok(regs) => regs,
            Err(err) => {
                warn!("unable to fetch general registers: {}", err);
                return;
            }
        };
        trace!(
            "fetched gregs from {}: pc={:#010x} msr={:?}",
            tid,
            regs.pc(),
            regs.msr_flags()
        );

        for regno in regnum::R0..=regnum::FSR {
            if let Some(val) = regs.get(regno) {
                cache.raw_supply(regno, &val.to_ne_bytes());
            }
        }
        // The last register in the fetched range is normalized like an
        // address before it lands in the cache.
        if let Some(val) = regs.get(regnum::FSR) {
            let val = arch::addr_bits_remove(val);
            cache.raw_supply(regnum::FSR, &val.to_ne_bytes());
        }
    }

    /// Fetch a single general register into the cache.
    fn fetch_register(&mut self, cache: &mut dyn RegCache, regno: usize) {
        let tid = self.ptid.resolve();
        let regs = match self.tracer.getregs(tid) {
            Ok(regs) => regs,
            Err(err) => {
                warn!("unable to fetch general register: {}", err);
                return;
            }
        };

        if (regnum::R0..=regnum::FSR).contains(&regno) {
            if let Some(val) = regs.get(regno) {
                let val = arch::addr_bits_remove(val);
                cache.raw_supply(regno, &val.to_ne_bytes());
            }
        }
    }

    /// Write every cache-valid general register back to the inferior.
    fn store_regs(&mut self, cache: &dyn RegCache) {
        let tid = self.ptid.resolve();
        let mut regs = match self.tracer.getregs(tid) {
            Ok(regs) => regs,
            Err(err) => {
                warn!("unable to fetch general registers: {}", err);
                return;
            }
        };

        for regno in regnum::R0..=regnum::FSR {
            if cache.reg_valid(regno) {
                let mut buf = [0; REGISTER_SIZE];
                cache.raw_collect(regno, &mut buf);
                let _ = regs.set(regno, u32::from_ne_bytes(buf));
            }
        }

        if let Err(err) = self.tracer.setregs(tid, &regs) {
            warn!("unable to store general registers: {}", err);
        }
    }

    /// Write a single register back to the inferior, if the cache holds a
    /// valid value for it.
    fn store_register(&mut self, cache: &dyn RegCache, regno: usize) {
        if !cache.reg_valid(regno) {
            return;
        }

        let tid = self.ptid.resolve();
        let mut regs = match self.tracer.getregs(tid) {
            Ok(regs) => regs,
            Err(err) => {
                warn!("unable to fetch general registers: {}", err);
                return;
            }
        };

        if (regnum::R0..=regnum::FSR).contains(&regno) {
            let mut buf = [0; REGISTER_SIZE];
            cache.raw_collect(regno, &mut buf);
            let _ = regs.set(regno, u32::from_ne_bytes(buf));
        }

        if let Err(err) = self.tracer.setregs(tid, &regs) {
            warn!("unable to store general register: {}", err);
        }
    }
}

impl<T: Tracer> NativeOps for MicroBlazeLinuxNat<T> {
    fn fetch_registers(&mut self, cache: &mut dyn RegCache, which: RegSelector) {
        match which {
            RegSelector::All => self.fetch_regs(cache),
            RegSelector::One(regno) if regno <= regnum::PC => self.fetch_register(cache, regno),
            RegSelector::One(_) => {}
        }
    }

    fn store_registers(&mut self, cache: &dyn RegCache, which: RegSelector) {
        match which {
            RegSelector::All => self.store_regs(cache),
            RegSelector::One(regno) if regno <= regnum::PC => self.store_register(cache, regno),
            RegSelector::One(_) => {}
        }
    }

    fn insert_breakpoint(
        &mut self,
        mem: &mut dyn Memory,
        site: &mut BreakpointSite,
    ) -> TargetResult<()> {
        tdep::insert_breakpoint(&MicroBlaze, mem, site)
    }

    fn remove_breakpoint(
        &mut self,
        mem: &mut dyn Memory,
        site: &BreakpointSite,
    ) -> TargetResult<()> {
        tdep::remove_breakpoint(&MicroBlaze, mem, site)
    }

    fn read_description(&mut self, auxv: &mut dyn Auxv) -> Option<&'static str> {
        let hwcap = auxv.search(AT_HWCAP)?;
        trace!("inferior AT_HWCAP = {:#x}", hwcap);
        // No variant target descriptions exist for MicroBlaze yet; the
        // capability word is looked up so future descriptions can key off
        // it, but nothing is selected today.
        None
    }
}

/// Copy registers from a raw general register block into the cache.
///
/// Thread-library code hands over regset buffers directly instead of going
/// through a tracing call; the PC picks up the usual address normalization
/// on the way in.
pub fn supply_gregset(cache: &mut dyn RegCache, which: RegSelector, gregs: &Gregs) {
    for regno in regnum::R0..regnum::PC {
        if which.selects(regno) {
            if let Some(val) = gregs.get(regno) {
                cache.raw_supply(regno, &val.to_ne_bytes());
            }
        }
    }

    if which.selects(regnum::PC) {
        if let Some(pc) = gregs.get(regnum::PC) {
            let pc = arch::addr_bits_remove(pc);
            cache.raw_supply(regnum::PC, &pc.to_ne_bytes());
        }
    }
}

/// Copy registers from the cache into a raw general register block.
pub fn collect_gregset(cache: &dyn RegCache, which: RegSelector, gregs: &mut Gregs) {
    for regno in regnum::R0..=regnum::PC {
        if which.selects(regno) {
            let mut buf = [0; REGISTER_SIZE];
            cache.raw_collect(regno, &mut buf);
            let _ = gregs.set(regno, u32::from_ne_bytes(buf));
        }
    }
}

/// Supply floating point registers to the cache.
///
/// Known gap: the MicroBlaze kernel exposes no FPU regset, so this is a
/// deliberate no-op in both directions rather than an error.
pub fn supply_fpregset(_cache: &mut dyn RegCache, _which: RegSelector, _fpregs: &[u8]) {}

/// Collect floating point registers from the cache.
///
/// Known gap, same as [`supply_fpregset`].
pub fn collect_fpregset(_cache: &dyn RegCache, _which: RegSelector, _fpregs: &mut [u8]) {}
