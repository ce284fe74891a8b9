use crate::msr::Msr;
use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// `IA32_EFER` / EFER (MSR `0xC000_0080`).
///
/// Only `SVME` matters to the launcher: on AMD parts `SKINIT` is available
/// once SVM is enabled here.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Efer {
    /// Bit 0 — SCE: System Call Extensions.
    pub sce: bool,

    /// Bits 1–7 — Reserved / legacy K6 bits.
    #[bits(7)]
    pub reserved_1_7: u8,

    /// Bit 8 — LME: Long Mode Enable.
    pub lme: bool,

    /// Bit 9 — Reserved.
    pub reserved_9: bool,

    /// Bit 10 — LMA: Long Mode Active.
    pub lma: bool,

    /// Bit 11 — NXE: No-Execute Enable.
    pub nxe: bool,

    /// Bit 12 — SVME: Secure Virtual Machine Enable.
    pub svme: bool,

    /// Bits 13–63 — Other extensions and reserved bits.
    #[bits(51)]
    pub reserved_13_63: u64,
}

impl Efer {
    pub const MSR: Msr = Msr::new(0xC000_0080);
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Efer {
    unsafe fn load_unsafe() -> Self {
        Self::from_bits(unsafe { Self::MSR.load_raw() })
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Efer {
    unsafe fn store_unsafe(self) {
        unsafe { Self::MSR.store_raw(self.into_bits()) }
    }
}
