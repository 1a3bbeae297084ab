//! MicroBlaze register identifiers.

use crate::arch::regnum;
use crate::arch::REGISTER_SIZE;

/// MicroBlaze register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MicroBlazeRegId {
    /// General purpose registers (R0-R31).
    Gpr(u8),
    /// Program Counter.
    Pc,
    /// Machine Status Register.
    Msr,
    /// Exception Address Register.
    Ear,
    /// Exception Status Register.
    Esr,
    /// Floating point Status Register.
    Fsr,
    /// Branch Target Register.
    Btr,
}

impl MicroBlazeRegId {
    /// Map a raw register number to an identifier and register size.
    ///
    /// Returns `None` if the register does not exist.
    pub fn from_raw_id(id: usize) -> Option<(Self, usize)> {
        let reg = match id {
            0..=31 => Self::Gpr(id as u8),
            32 => Self::Pc,
            33 => Self::Msr,
            34 => Self::Ear,
            35 => Self::Esr,
            36 => Self::Fsr,
            37 => Self::Btr,
            _ => return None,
        };
        Some((reg, REGISTER_SIZE))
    }

    /// The register number this identifier occupies in the general register
    /// block.
    pub fn regnum(self) -> usize {
        match self {
            Self::Gpr(n) => n as usize,
            Self::Pc => regnum::PC,
            Self::Msr => regnum::MSR,
            Self::Ear => regnum::EAR,
            Self::Esr => regnum::ESR,
            Self::Fsr => regnum::FSR,
            Self::Btr => regnum::BTR,
        }
    }
}
