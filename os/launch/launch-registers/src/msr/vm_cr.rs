use crate::msr::Msr;
use bitfield_struct::bitfield;

/// AMD `VM_CR` (MSR `0xC001_0114`).
///
/// Firmware can disable SVM (and with it `SKINIT` through `EFER.SVME`) by
/// setting `SVMDIS`.
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct VmCr {
    /// Bit 0 — DPD: debug port disable.
    pub dpd: bool,

    /// Bit 1 — R_INIT: intercept INIT.
    pub r_init: bool,

    /// Bit 2 — DIS_A20M.
    pub dis_a20m: bool,

    /// Bit 3 — LOCK: `SVMDIS` is read-only.
    pub lock: bool,

    /// Bit 4 — SVMDIS: writes of `EFER.SVME = 1` fault.
    pub svmdis: bool,

    /// Bits 5–63 — Reserved.
    #[bits(59)]
    pub reserved_5_63: u64,
}

impl VmCr {
    pub const MSR: Msr = Msr::new(0xC001_0114);
}
