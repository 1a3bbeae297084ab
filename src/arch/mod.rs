//! MicroBlaze architecture description: register numbering, address
//! normalization, and software breakpoint encodings.

use crate::target::BreakpointEncoder;

pub mod reg;

/// Width of every slot in the general register block, in bytes.
pub const REGISTER_SIZE: usize = 4;

/// Number of slots in the kernel's general register block.
pub const NUM_GREGS: usize = 38;

/// Register numbers, matching the slot order of the kernel's `ptrace`
/// register block.
pub mod regnum {
    /// First general purpose register.
    pub const R0: usize = 0;
    /// Stack pointer (R1).
    pub const SP: usize = 1;
    /// Last general purpose register.
    pub const R31: usize = 31;
    /// Program counter.
    pub const PC: usize = 32;
    /// Machine status register.
    pub const MSR: usize = 33;
    /// Exception address register.
    pub const EAR: usize = 34;
    /// Exception status register.
    pub const ESR: usize = 35;
    /// Floating point status register.
    pub const FSR: usize = 36;
    /// Branch target register.
    pub const BTR: usize = 37;
}

/// Strip the non-address bits from an address-bearing register value.
///
/// MicroBlaze instructions are word aligned; the low two bits of a code
/// address carry processor mode, not address.
pub fn addr_bits_remove(addr: u32) -> u32 {
    addr & !0x3
}

/// Canonical software breakpoint instruction: `brki r16, 0x18`, in the
/// big-endian order it occupies in inferior memory.
pub const BREAK_INSN: [u8; 4] = [0xba, 0x0c, 0x00, 0x18];

/// The only `brki` immediates that vector to the debug exception handler.
///
/// Any other immediate executed in user mode raises SIGILL instead of
/// trapping, which would kill the debug session.
pub const BREAK_VECTORS: [u32; 2] = [0x8, 0x18];

/// Whether `insn` is one of the two legal software breakpoint encodings.
pub fn is_breakpoint_insn(insn: u32) -> bool {
    BREAK_VECTORS.iter().any(|&imm| insn == (0xba0c_0000 | imm))
}

/// The MicroBlaze architecture table.
///
/// Owns the canonical answer to "what does a breakpoint look like here", so
/// no call site ever hand-constructs the instruction pattern.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicroBlaze;

impl MicroBlaze {
    /// Target description for GDB-style hosts.
    pub fn target_description_xml() -> &'static str {
        r#"<target version="1.0"><architecture>microblaze</architecture></target>"#
    }
}

impl BreakpointEncoder for MicroBlaze {
    fn breakpoint_from_pc(&self, pc: u32) -> Option<(u32, &'static [u8])> {
        // No placement adjustment on MicroBlaze.
        Some((pc, &BREAK_INSN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_mask_strips_mode_bits() {
        assert_eq!(addr_bits_remove(0x1000_0003), 0x1000_0000);
        assert_eq!(addr_bits_remove(0x1000_0004), 0x1000_0004);
    }

    #[test]
    fn breakpoint_encodings() {
        assert!(is_breakpoint_insn(0xba0c_0008));
        assert!(is_breakpoint_insn(0xba0c_0018));
        // `brki r16, 0x10` would SIGILL in user mode.
        assert!(!is_breakpoint_insn(0xba0c_0010));

        let (addr, insn) = MicroBlaze.breakpoint_from_pc(0x4800).unwrap();
        assert_eq!(addr, 0x4800);
        let word = u32::from_be_bytes([insn[0], insn[1], insn[2], insn[3]]);
        assert!(is_breakpoint_insn(word));
    }

    #[test]
    fn target_description() {
        assert!(MicroBlaze::target_description_xml().contains("<architecture>microblaze<"));
    }
}
