//! Provides the [`Ia32ApicBase`] type.

use crate::msr::Msr;
use bitfield_struct::bitfield;

/// `IA32_APIC_BASE` (MSR `0x1B`).
///
/// Bit 8 is set by hardware on the bootstrap processor only; the launcher
/// refuses to run anywhere else.
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct Ia32ApicBase {
    /// Bits 0–7 — Reserved.
    #[bits(8)]
    pub reserved_0_7: u8,

    /// Bit 8 — BSP: this processor is the bootstrap processor.
    pub bsp: bool,

    /// Bit 9 — Reserved.
    pub reserved_9: bool,

    /// Bit 10 — EXTD: x2APIC mode enabled.
    pub extd: bool,

    /// Bit 11 — EN: APIC global enable.
    pub enable: bool,

    /// Bits 12–63 — APIC base physical page number (upper bits reserved
    /// above `MAXPHYADDR`).
    #[bits(52)]
    pub base_page: u64,
}

impl Ia32ApicBase {
    pub const IA32_APIC_BASE: u32 = 0x1B;
    pub const MSR: Msr = Msr::new(Self::IA32_APIC_BASE);

    /// Physical address of the local APIC register page.
    #[inline]
    #[must_use]
    pub const fn base_address(&self) -> u64 {
        self.base_page() << 12
    }
}
