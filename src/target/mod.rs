//! Capability traits connecting this backend to the debugger core.
//!
//! The host used to reach architecture backends through a table of raw
//! function pointers. Here that table is an explicit interface: the host
//! holds a [`NativeOps`] trait object for the operations this crate
//! implements, and passes its own services (register cache, inferior memory,
//! frame cache, auxiliary vector) in as trait objects when invoking them.

use core::fmt;

/// Which registers a transfer applies to.
///
/// Replaces the traditional "regno == -1 means all registers" convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegSelector {
    /// Every register.
    All,
    /// A single register, by register number.
    One(usize),
}

impl RegSelector {
    /// Whether `regnum` is covered by this selector.
    pub fn selects(&self, regnum: usize) -> bool {
        match self {
            RegSelector::All => true,
            RegSelector::One(n) => *n == regnum,
        }
    }
}

/// The host's per-thread register cache.
///
/// Owned and allocated by the debugger core; this crate only marshals values
/// in and out through these accessors.
pub trait RegCache {
    /// Store the raw value of register `regnum` and mark it valid.
    fn raw_supply(&mut self, regnum: usize, bytes: &[u8]);

    /// Copy the cached raw value of register `regnum` into `buf`.
    fn raw_collect(&self, regnum: usize, buf: &mut [u8]);

    /// Whether the cache holds a valid value for register `regnum`.
    fn reg_valid(&self, regnum: usize) -> bool;
}

/// A hard error aborting the requested host operation.
///
/// Tracing-call failures deliberately do *not* show up here: register
/// transfers report them as warnings and abort the single transfer, leaving
/// the host running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TargetError {
    /// The architecture table could not produce a breakpoint encoding.
    Unsupported,
    /// Reading inferior memory at `addr` failed.
    MemoryRead {
        /// Faulting address.
        addr: u32,
    },
    /// Writing inferior memory at `addr` failed.
    MemoryWrite {
        /// Faulting address.
        addr: u32,
    },
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::TargetError::*;
        match self {
            Unsupported => write!(f, "software breakpoints not implemented for this target"),
            MemoryRead { addr } => write!(f, "cannot read inferior memory at {:#010x}", addr),
            MemoryWrite { addr } => write!(f, "cannot write inferior memory at {:#010x}", addr),
        }
    }
}

impl std::error::Error for TargetError {}

/// Result alias used by the fallible host operations.
pub type TargetResult<T> = Result<T, TargetError>;

/// Inferior memory, as exposed by the debugger core.
pub trait Memory {
    /// Read `buf.len()` bytes starting at `addr`.
    fn read_mem(&mut self, addr: u32, buf: &mut [u8]) -> TargetResult<()>;

    /// Write `data` starting at `addr`.
    fn write_mem(&mut self, addr: u32, data: &[u8]) -> TargetResult<()>;
}

/// The architecture table's breakpoint encoding lookup.
pub trait BreakpointEncoder {
    /// Canonical breakpoint instruction for a breakpoint requested at `pc`.
    ///
    /// Returns the (possibly adjusted) placement address and the instruction
    /// bytes, or `None` if the architecture has no software breakpoint.
    fn breakpoint_from_pc(&self, pc: u32) -> Option<(u32, &'static [u8])>;
}

/// Maximum breakpoint instruction length supported by [`BreakpointSite`].
pub const BREAKPOINT_MAX: usize = 4;

/// Host-owned bookkeeping for one software breakpoint location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointSite {
    /// Address the debugger asked to break at.
    pub requested_address: u32,
    /// Address the breakpoint instruction was actually placed at.
    pub placed_address: u32,
    /// Number of instruction bytes replaced.
    pub placed_size: usize,
    /// Original memory contents, restored on removal.
    pub shadow: [u8; BREAKPOINT_MAX],
}

impl BreakpointSite {
    /// A not-yet-inserted site for a breakpoint requested at `addr`.
    pub fn new(addr: u32) -> Self {
        BreakpointSite {
            requested_address: addr,
            placed_address: addr,
            placed_size: 0,
            shadow: [0; BREAKPOINT_MAX],
        }
    }
}

/// Identity of an unwound frame, used by the host for frame equality
/// comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameId {
    /// Stack base address of the frame.
    pub stack: u32,
    /// Function entry address of the frame.
    pub code: u32,
}

/// The host's frame cache, filled in while unwinding one frame.
pub trait FrameSink {
    /// Record that register `regnum` was saved at address `addr`.
    fn set_reg_addr(&mut self, regnum: usize, addr: u32);

    /// Record the identity of the frame being unwound.
    fn set_frame_id(&mut self, id: FrameId);
}

/// `AT_HWCAP`: the capability word in the auxiliary vector.
pub const AT_HWCAP: u32 = 16;

/// Lookup into the traced process's auxiliary vector.
pub trait Auxv {
    /// Value of the auxiliary vector entry `key`, if present.
    fn search(&mut self, key: u32) -> Option<u32>;
}

/// The capability set this backend registers with the debugger core.
///
/// One implementation per architecture/OS pair; the core holds it as a
/// `&mut dyn NativeOps` and routes the corresponding user operations here.
pub trait NativeOps {
    /// Copy registers from the traced process into the register cache.
    fn fetch_registers(&mut self, cache: &mut dyn RegCache, which: RegSelector);

    /// Copy cache-valid registers back into the traced process.
    fn store_registers(&mut self, cache: &dyn RegCache, which: RegSelector);

    /// Plant a software breakpoint, saving the displaced bytes in `site`.
    fn insert_breakpoint(
        &mut self,
        mem: &mut dyn Memory,
        site: &mut BreakpointSite,
    ) -> TargetResult<()>;

    /// Restore the bytes displaced by a previously inserted breakpoint.
    fn remove_breakpoint(
        &mut self,
        mem: &mut dyn Memory,
        site: &BreakpointSite,
    ) -> TargetResult<()>;

    /// Variant target description for the running inferior, if any.
    fn read_description(&mut self, auxv: &mut dyn Auxv) -> Option<&'static str>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector() {
        assert!(RegSelector::All.selects(0));
        assert!(RegSelector::All.selects(37));
        assert!(RegSelector::One(5).selects(5));
        assert!(!RegSelector::One(5).selects(6));
    }

    #[test]
    fn frame_id_equality() {
        let a = FrameId {
            stack: 0xbffe_f000,
            code: 0x1000_0400,
        };
        assert_eq!(a, a);
        assert_ne!(
            a,
            FrameId {
                stack: 0xbffe_f000,
                code: 0x1000_0404,
            }
        );
    }
}
