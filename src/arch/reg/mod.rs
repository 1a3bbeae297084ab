//! The MicroBlaze general register block and its typed accessors.

use super::regnum;
use super::NUM_GREGS;
use super::REGISTER_SIZE;

pub mod id;

/// Total size of the general register block in bytes.
pub const GREGS_BYTES: usize = NUM_GREGS * REGISTER_SIZE;

bitflags::bitflags! {
    /// Machine status register flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MsrFlags: u32 {
        /// Buslock enable.
        const BE = 1 << 0;
        /// Interrupt enable.
        const IE = 1 << 1;
        /// Arithmetic carry.
        const C = 1 << 2;
        /// Break in progress.
        const BIP = 1 << 3;
        /// FSL error.
        const FSL = 1 << 4;
        /// Instruction cache enable.
        const ICE = 1 << 5;
        /// Division by zero.
        const DZO = 1 << 6;
        /// Data cache enable.
        const DCE = 1 << 7;
        /// Exception enable.
        const EE = 1 << 8;
        /// Exception in progress.
        const EIP = 1 << 9;
        /// Processor version register exists.
        const PVR = 1 << 10;
        /// User mode.
        const UM = 1 << 11;
        /// User mode save.
        const UMS = 1 << 12;
        /// Virtual mode.
        const VM = 1 << 13;
        /// Virtual mode save.
        const VMS = 1 << 14;
        /// Copy of the arithmetic carry (MSR bit 31).
        const CC = 1 << 31;
    }
}

/// The general register block, as read and written by the OS tracing
/// facility.
///
/// Slot N holds register number N: R0-R31, then PC, MSR, EAR, ESR, FSR, BTR
/// (see [`regnum`](crate::arch::regnum)). Words are kept in the traced
/// process's native representation; no per-register byte swapping happens
/// here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gregs {
    words: [u32; NUM_GREGS],
}

impl Default for Gregs {
    fn default() -> Self {
        Gregs {
            words: [0; NUM_GREGS],
        }
    }
}

impl Gregs {
    /// Wrap a raw word array in slot order.
    pub fn from_words(words: [u32; NUM_GREGS]) -> Self {
        Gregs { words }
    }

    /// The raw word array, in slot order.
    pub fn words(&self) -> &[u32; NUM_GREGS] {
        &self.words
    }

    /// Decode a register block from its raw byte representation.
    ///
    /// Returns `None` unless `bytes` is exactly [`GREGS_BYTES`] long.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != GREGS_BYTES {
            return None;
        }

        let mut words = [0; NUM_GREGS];
        for (slot, chunk) in words.iter_mut().zip(bytes.chunks_exact(REGISTER_SIZE)) {
            let mut raw = [0; REGISTER_SIZE];
            raw.copy_from_slice(chunk);
            *slot = u32::from_ne_bytes(raw);
        }
        Some(Gregs { words })
    }

    /// Encode the register block into its raw byte representation.
    pub fn to_bytes(&self) -> [u8; GREGS_BYTES] {
        let mut bytes = [0; GREGS_BYTES];
        for (chunk, word) in bytes.chunks_exact_mut(REGISTER_SIZE).zip(self.words.iter()) {
            chunk.copy_from_slice(&word.to_ne_bytes());
        }
        bytes
    }

    /// Value of register `regnum`, or `None` if the number is out of range.
    pub fn get(&self, regnum: usize) -> Option<u32> {
        self.words.get(regnum).copied()
    }

    /// Overwrite register `regnum`. Out-of-range numbers are never copied.
    pub fn set(&mut self, regnum: usize, val: u32) -> Option<()> {
        let slot = self.words.get_mut(regnum)?;
        *slot = val;
        Some(())
    }

    /// Stack pointer (R1).
    pub fn sp(&self) -> u32 {
        self.words[regnum::SP]
    }

    /// Program counter.
    pub fn pc(&self) -> u32 {
        self.words[regnum::PC]
    }

    /// Machine status register, raw.
    pub fn msr(&self) -> u32 {
        self.words[regnum::MSR]
    }

    /// Machine status register, decoded flag bits.
    pub fn msr_flags(&self) -> MsrFlags {
        MsrFlags::from_bits_truncate(self.msr())
    }
}
