use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// CR4 — Control Register 4.
///
/// The launcher cares about two bits: `SMXE`, which must be set before any
/// `GETSEC` leaf can run, and `PGE`, which is cleared while memory types are
/// reprogrammed so that no stale global TLB entries survive.
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct Cr4 {
    /// Bit 0 — VME: Virtual-8086 Mode Extensions.
    pub vme: bool,

    /// Bit 1 — PVI: Protected-Mode Virtual Interrupts.
    pub pvi: bool,

    /// Bit 2 — TSD: Time Stamp Disable.
    pub tsd: bool,

    /// Bit 3 — DE: Debugging Extensions.
    pub de: bool,

    /// Bit 4 — PSE: Page Size Extensions.
    pub pse: bool,

    /// Bit 5 — PAE: Physical Address Extension.
    pub pae: bool,

    /// Bit 6 — MCE: Machine-Check Enable.
    pub mce: bool,

    /// Bit 7 — PGE: Page Global Enable.
    pub pge: bool,

    /// Bit 8 — PCE: Performance-Monitoring Counter Enable.
    pub pce: bool,

    /// Bit 9 — OSFXSR.
    pub osfxsr: bool,

    /// Bit 10 — OSXMMEXCPT.
    pub osxmmexcpt: bool,

    /// Bit 11 — UMIP.
    pub umip: bool,

    /// Bit 12 — LA57.
    pub la57: bool,

    /// Bit 13 — VMXE: VMX Enable.
    pub vmxe: bool,

    /// Bit 14 — SMXE: Safer Mode Extensions Enable.
    ///
    /// `GETSEC` raises `#UD` while this bit is clear.
    pub smxe: bool,

    /// Bit 15 — Reserved.
    pub reserved_15: bool,

    /// Bit 16 — FSGSBASE.
    pub fsgsbase: bool,

    /// Bit 17 — PCIDE.
    pub pcide: bool,

    /// Bit 18 — OSXSAVE.
    pub osxsave: bool,

    /// Bit 19 — Reserved.
    pub reserved_19: bool,

    /// Bit 20 — SMEP.
    pub smep: bool,

    /// Bit 21 — SMAP.
    pub smap: bool,

    /// Bit 22 — PKE.
    pub pke: bool,

    /// Bits 23–63 — Reserved.
    #[bits(41)]
    pub reserved_23_63: u64,
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Cr4 {
    unsafe fn load_unsafe() -> Self {
        let cr4: u64;
        unsafe {
            core::arch::asm!("mov {}, cr4", out(reg) cr4, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr4)
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Cr4 {
    unsafe fn store_unsafe(self) {
        let cr4 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr4, {}", in(reg) cr4, options(nostack, preserves_flags));
        }
    }
}
