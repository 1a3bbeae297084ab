//! Target-dependent MicroBlaze/Linux ABI knowledge: software breakpoints,
//! signal-trampoline unwinding, and the shared-library link-map layout.

use log::trace;

use crate::arch::regnum;
use crate::arch::REGISTER_SIZE;
use crate::target::Auxv;
use crate::target::BreakpointEncoder;
use crate::target::BreakpointSite;
use crate::target::FrameId;
use crate::target::FrameSink;
use crate::target::Memory;
use crate::target::TargetError;
use crate::target::TargetResult;
use crate::target::AT_HWCAP;
use crate::version::KernelVersion;

/// Plant a software breakpoint at the site's requested address.
///
/// The instruction pattern always comes from the architecture table: only
/// two `brki` immediates trap cleanly in user mode, so the encoding is never
/// constructed at the call site. The displaced bytes are saved in `site` for
/// later removal.
pub fn insert_breakpoint(
    encoder: &dyn BreakpointEncoder,
    mem: &mut dyn Memory,
    site: &mut BreakpointSite,
) -> TargetResult<()> {
    let (addr, insn) = encoder
        .breakpoint_from_pc(site.requested_address)
        .ok_or(TargetError::Unsupported)?;

    site.placed_address = addr;
    site.placed_size = insn.len();

    mem.read_mem(addr, &mut site.shadow[..insn.len()])?;
    mem.write_mem(addr, insn)?;
    Ok(())
}

/// Restore the bytes displaced by a previously inserted breakpoint.
///
/// The encoding and length are recomputed for the placed address rather than
/// trusted from the site record.
pub fn remove_breakpoint(
    encoder: &dyn BreakpointEncoder,
    mem: &mut dyn Memory,
    site: &BreakpointSite,
) -> TargetResult<()> {
    let (addr, insn) = encoder
        .breakpoint_from_pc(site.placed_address)
        .ok_or(TargetError::Unsupported)?;

    mem.write_mem(addr, &site.shadow[..insn.len()])?;
    Ok(())
}

/// A signal-trampoline unwinder descriptor.
///
/// A trampoline is recognized purely by the exact instruction words at its
/// entry; anything else at that location is not a signal frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrampFrame {
    /// Size of each instruction in the signature, in bytes.
    pub insn_size: usize,
    /// The instruction words identifying the stub.
    pub insns: &'static [u32],
    /// Offset from the frame's stack base to the saved register block.
    pub regblock_offset: u32,
    /// Correction for trampolines that adjust the stack before saving
    /// context (zero for the plain handler stub).
    pub bias: u32,
}

/// The kernel's signal-return stub: `addik r12, r0, 119` (`__NR_sigreturn`)
/// followed by `brki r14, 0x8`. The register block sits 24 bytes into the
/// signal context on the stack.
pub const SIGHANDLER_TRAMP_FRAME: TrampFrame = TrampFrame {
    insn_size: 4,
    insns: &[0x3180_0077, 0xb9cc_0008],
    regblock_offset: 24,
    bias: 0,
};

impl TrampFrame {
    /// Whether the bytes at a candidate trampoline entry match this
    /// descriptor's signature. Instructions are big-endian in memory.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        if bytes.len() < self.insns.len() * self.insn_size {
            return false;
        }
        self.insns.iter().enumerate().all(|(i, &insn)| {
            let start = i * self.insn_size;
            let mut raw = [0; 4];
            raw.copy_from_slice(&bytes[start..start + 4]);
            u32::from_be_bytes(raw) == insn
        })
    }

    /// Fill the host's frame cache for a recognized trampoline frame.
    ///
    /// `sp` is the unwound stack pointer of the handler's caller frame,
    /// `func` the trampoline entry address, and `pc` the address actually
    /// being unwound.
    pub fn cache_init(&self, sink: &mut dyn FrameSink, sp: u32, func: u32, pc: u32) {
        sigtramp_cache(sink, sp, func, pc, self.regblock_offset, self.bias)
    }
}

/// Register the saved-register addresses and frame identity for a signal
/// trampoline frame.
///
/// The saved register block lives at `sp + offset`, one word per register in
/// block order. Trampolines that increment the stack as their first
/// instruction are compensated through `bias`, but only once the unwind has
/// moved past the entry instruction.
pub fn sigtramp_cache(
    sink: &mut dyn FrameSink,
    sp: u32,
    func: u32,
    pc: u32,
    offset: u32,
    bias: u32,
) {
    let mut base = sp;
    if bias > 0 && pc != func {
        base = base.wrapping_sub(bias);
    }

    let gpregs = base.wrapping_add(offset);
    for regno in 0..regnum::BTR {
        sink.set_reg_addr(
            regno,
            gpregs.wrapping_add((regno * REGISTER_SIZE) as u32),
        );
    }
    sink.set_frame_id(FrameId {
        stack: base,
        code: func,
    });
}

/// SVR4 `r_debug` and `link_map` field offsets for a 32-bit inferior,
/// letting the host walk the dynamic linker's bookkeeping from outside the
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkMapOffsets {
    /// Offset of `r_version` within `r_debug`.
    pub r_version_offset: u32,
    /// Size of the `r_version` field.
    pub r_version_size: usize,
    /// Offset of `r_map` within `r_debug`.
    pub r_map_offset: u32,
    /// Offset of `r_brk` within `r_debug`.
    pub r_brk_offset: u32,
    /// Offset of `r_ldsomap` within `r_debug`, when the OS provides one.
    pub r_ldsomap_offset: Option<u32>,
    /// Size of one `link_map` entry.
    pub link_map_size: usize,
    /// Offset of `l_addr` within `link_map`.
    pub l_addr_offset: u32,
    /// Offset of `l_name` within `link_map`.
    pub l_name_offset: u32,
    /// Offset of `l_ld` within `link_map`.
    pub l_ld_offset: u32,
    /// Offset of `l_next` within `link_map`.
    pub l_next_offset: u32,
    /// Offset of `l_prev` within `link_map`.
    pub l_prev_offset: u32,
}

/// Layout used by ILP32 SVR4 dynamic linkers, which is what MicroBlaze/Linux
/// runs.
pub const ILP32_LINK_MAP_OFFSETS: LinkMapOffsets = LinkMapOffsets {
    r_version_offset: 0,
    r_version_size: 4,
    r_map_offset: 4,
    r_brk_offset: 8,
    r_ldsomap_offset: None,
    link_map_size: 20,
    l_addr_offset: 0,
    l_name_offset: 4,
    l_ld_offset: 8,
    l_next_offset: 12,
    l_prev_offset: 16,
};

/// The one-time ABI registration record handed to the debugger core at
/// startup.
///
/// Breakpoint insertion/removal travels separately, as part of the
/// [`NativeOps`](crate::target::NativeOps) capability set.
#[derive(Debug)]
pub struct Abi {
    /// Shared-library bookkeeping layout for this pointer width.
    pub link_map: LinkMapOffsets,
    /// Signal-trampoline unwinder descriptor.
    pub sigtramp: &'static TrampFrame,
    /// Kernel version detected at startup. Recorded so future behavior can
    /// key off it; nothing consumes it yet.
    pub kernel_version: Option<KernelVersion>,
    /// `AT_HWCAP` word from the inferior's auxiliary vector. Fetched at
    /// registration, likewise not yet acted upon.
    pub hwcap: Option<u32>,
}

impl Abi {
    /// Detect startup facts and assemble the registration record.
    pub fn new(auxv: &mut dyn Auxv) -> Self {
        let kernel_version = KernelVersion::detect();
        if let Some(v) = kernel_version {
            trace!("running on GNU/Linux {:#010x}", v.combined());
        }

        Abi {
            link_map: ILP32_LINK_MAP_OFFSETS,
            sigtramp: &SIGHANDLER_TRAMP_FRAME,
            kernel_version,
            hwcap: auxv.search(AT_HWCAP),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::MicroBlaze;
    use crate::arch::BREAK_INSN;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockMemory {
        bytes: HashMap<u32, u8>,
        fail_writes: bool,
    }

    impl MockMemory {
        fn load(&mut self, addr: u32, data: &[u8]) {
            for (i, b) in data.iter().enumerate() {
                self.bytes.insert(addr + i as u32, *b);
            }
        }

        fn dump(&self, addr: u32, len: usize) -> Vec<u8> {
            (0..len)
                .map(|i| self.bytes.get(&(addr + i as u32)).copied().unwrap_or(0))
                .collect()
        }
    }

    impl Memory for MockMemory {
        fn read_mem(&mut self, addr: u32, buf: &mut [u8]) -> TargetResult<()> {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = *self
                    .bytes
                    .get(&(addr + i as u32))
                    .ok_or(TargetError::MemoryRead { addr })?;
            }
            Ok(())
        }

        fn write_mem(&mut self, addr: u32, data: &[u8]) -> TargetResult<()> {
            if self.fail_writes {
                return Err(TargetError::MemoryWrite { addr });
            }
            self.load(addr, data);
            Ok(())
        }
    }

    struct NoEncoding;
    impl BreakpointEncoder for NoEncoding {
        fn breakpoint_from_pc(&self, _pc: u32) -> Option<(u32, &'static [u8])> {
            None
        }
    }

    #[derive(Default)]
    struct MockFrameSink {
        reg_addrs: HashMap<usize, u32>,
        frame_id: Option<FrameId>,
    }

    impl FrameSink for MockFrameSink {
        fn set_reg_addr(&mut self, regnum: usize, addr: u32) {
            self.reg_addrs.insert(regnum, addr);
        }

        fn set_frame_id(&mut self, id: FrameId) {
            self.frame_id = Some(id);
        }
    }

    #[test]
    fn insert_then_remove_round_trips() {
        let mut mem = MockMemory::default();
        mem.load(0x4800, &[0x20, 0x60, 0x00, 0x2a]); // addi r3, r0, 42

        let mut site = BreakpointSite::new(0x4800);
        insert_breakpoint(&MicroBlaze, &mut mem, &mut site).unwrap();
        assert_eq!(site.placed_size, 4);
        assert_eq!(mem.dump(0x4800, 4), BREAK_INSN);

        remove_breakpoint(&MicroBlaze, &mut mem, &site).unwrap();
        assert_eq!(mem.dump(0x4800, 4), [0x20, 0x60, 0x00, 0x2a]);
    }

    #[test]
    fn insert_without_an_encoding_is_a_hard_error() {
        let mut mem = MockMemory::default();
        let mut site = BreakpointSite::new(0x4800);
        assert_eq!(
            insert_breakpoint(&NoEncoding, &mut mem, &mut site),
            Err(TargetError::Unsupported)
        );
    }

    #[test]
    fn insert_propagates_memory_failures() {
        let mut mem = MockMemory::default();
        mem.load(0x4800, &[0x20, 0x60, 0x00, 0x2a]);
        mem.fail_writes = true;

        let mut site = BreakpointSite::new(0x4800);
        assert_eq!(
            insert_breakpoint(&MicroBlaze, &mut mem, &mut site),
            Err(TargetError::MemoryWrite { addr: 0x4800 })
        );
        // The shadow copy still happened; nothing was written.
        assert_eq!(site.shadow, [0x20, 0x60, 0x00, 0x2a]);
        assert_eq!(mem.dump(0x4800, 4), [0x20, 0x60, 0x00, 0x2a]);
    }

    #[test]
    fn sigtramp_signature_recognition() {
        let stub = [0x31, 0x80, 0x00, 0x77, 0xb9, 0xcc, 0x00, 0x08];
        assert!(SIGHANDLER_TRAMP_FRAME.matches(&stub));

        // A single differing opcode is not a signal trampoline.
        let mut not_stub = stub;
        not_stub[3] = 0x76;
        assert!(!SIGHANDLER_TRAMP_FRAME.matches(&not_stub));

        // Nor is a truncated one.
        assert!(!SIGHANDLER_TRAMP_FRAME.matches(&stub[..4]));
    }

    #[test]
    fn sigtramp_cache_registers_saved_registers_and_identity() {
        let mut sink = MockFrameSink::default();
        let sp = 0xbffe_f000;
        let func = 0x1000_0400;
        SIGHANDLER_TRAMP_FRAME.cache_init(&mut sink, sp, func, func);

        let gpregs = sp + SIGHANDLER_TRAMP_FRAME.regblock_offset;
        for regno in 0..regnum::BTR {
            assert_eq!(
                sink.reg_addrs.get(&regno),
                Some(&(gpregs + (regno * REGISTER_SIZE) as u32))
            );
        }
        assert!(!sink.reg_addrs.contains_key(&regnum::BTR));
        assert_eq!(
            sink.frame_id,
            Some(FrameId {
                stack: sp,
                code: func,
            })
        );
    }

    #[test]
    fn sigtramp_cache_applies_the_bias_past_the_entry() {
        let mut sink = MockFrameSink::default();
        // Unwinding from inside the stub, with a stack-adjusting trampoline.
        sigtramp_cache(&mut sink, 0x1000, 0x400, 0x404, 24, 8);
        assert_eq!(
            sink.frame_id,
            Some(FrameId {
                stack: 0x1000 - 8,
                code: 0x400,
            })
        );

        // At the entry instruction the stack has not been adjusted yet.
        let mut sink = MockFrameSink::default();
        sigtramp_cache(&mut sink, 0x1000, 0x400, 0x400, 24, 8);
        assert_eq!(
            sink.frame_id,
            Some(FrameId {
                stack: 0x1000,
                code: 0x400,
            })
        );
    }

    #[test]
    fn ilp32_link_map_layout() {
        let lmo = ILP32_LINK_MAP_OFFSETS;
        assert_eq!(lmo.r_map_offset, 4);
        assert_eq!(lmo.r_brk_offset, 8);
        assert_eq!(lmo.link_map_size, 20);
        assert_eq!(lmo.l_prev_offset, 16);
        assert_eq!(lmo.r_ldsomap_offset, None);
    }

    #[test]
    fn abi_registration_collects_startup_facts() {
        struct FixedAuxv;
        impl Auxv for FixedAuxv {
            fn search(&mut self, key: u32) -> Option<u32> {
                assert_eq!(key, AT_HWCAP);
                Some(0x0)
            }
        }

        let abi = Abi::new(&mut FixedAuxv);
        assert_eq!(abi.link_map, ILP32_LINK_MAP_OFFSETS);
        assert_eq!(abi.sigtramp, &SIGHANDLER_TRAMP_FRAME);
        assert_eq!(abi.hwcap, Some(0x0));
        // kernel_version comes from uname(2); present or not, registration
        // completes either way.
    }
}
