use crate::msr::Msr;
use bitfield_struct::bitfield;

/// `IA32_MCG_CAP` (MSR `0x179`).
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct McgCap {
    /// Bits 0–7 — number of implemented error-reporting banks.
    #[bits(8)]
    pub count: u8,

    /// Bit 8 — `IA32_MCG_CTL` present.
    pub ctl_present: bool,

    /// Bits 9–63 — Extended capabilities, not used here.
    #[bits(55)]
    pub extended: u64,
}

impl McgCap {
    pub const MSR: Msr = Msr::new(0x179);
}

/// `IA32_MCG_STATUS` (MSR `0x17A`).
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct McgStatus {
    /// Bit 0 — RIPV: restart IP valid.
    pub ripv: bool,

    /// Bit 1 — EIPV: error IP valid.
    pub eipv: bool,

    /// Bit 2 — MCIP: machine check in progress.
    pub mcip: bool,

    /// Bit 3 — LMCE_S: local machine check signaled.
    pub lmce_s: bool,

    /// Bits 4–63 — Reserved.
    #[bits(60)]
    pub reserved_4_63: u64,
}

impl McgStatus {
    pub const MSR: Msr = Msr::new(0x17A);
}

/// `IA32_MCi_STATUS` (MSR `0x401 + 4i`).
///
/// Only the architectural flag bits are broken out; the error code fields
/// are kept together in [`McStatus::error_info`].
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct McStatus {
    /// Bits 0–56 — MCA/model error codes, other info, corrected count.
    #[bits(57)]
    pub error_info: u64,

    /// Bit 57 — PCC: processor context corrupt.
    pub pcc: bool,

    /// Bit 58 — ADDRV: `IA32_MCi_ADDR` valid.
    pub addrv: bool,

    /// Bit 59 — MISCV: `IA32_MCi_MISC` valid.
    pub miscv: bool,

    /// Bit 60 — EN: error reporting enabled.
    pub en: bool,

    /// Bit 61 — UC: uncorrected error.
    pub uc: bool,

    /// Bit 62 — OVER: error overflow.
    pub over: bool,

    /// Bit 63 — VAL: the bank holds a logged error.
    pub val: bool,
}

impl McStatus {
    pub const MSR_BASE: Msr = Msr::new(0x401);
}
