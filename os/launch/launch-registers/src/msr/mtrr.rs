use crate::msr::Msr;
use bitfield_struct::bitfield;

/// Memory types encodable in the MTRRs.
///
/// Encodings 2, 3 and 7+ are reserved; registers keep them as raw `u8`
/// so that a reserved value read from hardware still round-trips.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemoryType {
    Uncacheable = 0,
    WriteCombining = 1,
    WriteThrough = 4,
    WriteProtected = 5,
    WriteBack = 6,
}

impl MemoryType {
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Uncacheable),
            1 => Some(Self::WriteCombining),
            4 => Some(Self::WriteThrough),
            5 => Some(Self::WriteProtected),
            6 => Some(Self::WriteBack),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uncacheable => "UC",
            Self::WriteCombining => "WC",
            Self::WriteThrough => "WT",
            Self::WriteProtected => "WP",
            Self::WriteBack => "WB",
        }
    }
}

/// `IA32_MTRRCAP` (MSR `0xFE`), read-only.
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct MtrrCap {
    /// Bits 0–7 — VCNT: number of variable range pairs.
    #[bits(8)]
    pub vcnt: u8,

    /// Bit 8 — FIX: fixed-range MTRRs supported.
    pub fix: bool,

    /// Bit 9 — Reserved.
    pub reserved_9: bool,

    /// Bit 10 — WC: write-combining type supported.
    pub wc: bool,

    /// Bit 11 — SMRR supported.
    pub smrr: bool,

    /// Bits 12–63 — Reserved.
    #[bits(52)]
    pub reserved_12_63: u64,
}

impl MtrrCap {
    pub const MSR: Msr = Msr::new(0xFE);
}

/// `IA32_MTRR_DEF_TYPE` (MSR `0x2FF`).
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct MtrrDefType {
    /// Bits 0–7 — default memory type for unmapped addresses.
    #[bits(8)]
    pub mem_type: u8,

    /// Bits 8–9 — Reserved.
    #[bits(2)]
    pub reserved_8_9: u8,

    /// Bit 10 — FE: fixed-range MTRRs enabled.
    pub fixed_enable: bool,

    /// Bit 11 — E: all MTRRs enabled.
    pub enable: bool,

    /// Bits 12–63 — Reserved.
    #[bits(52)]
    pub reserved_12_63: u64,
}

impl MtrrDefType {
    pub const MSR: Msr = Msr::new(0x2FF);

    #[inline]
    #[must_use]
    pub const fn with_default_type(self, ty: MemoryType) -> Self {
        self.with_mem_type(ty.into_bits())
    }
}

/// `IA32_MTRR_PHYSBASEn` (MSR `0x200 + 2n`).
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct MtrrPhysBase {
    /// Bits 0–7 — memory type of the range.
    #[bits(8)]
    pub mem_type: u8,

    /// Bits 8–11 — Reserved.
    #[bits(4)]
    pub reserved_8_11: u8,

    /// Bits 12–63 — physical page number of the range base.
    ///
    /// Modeled at full width; callers mask it with `MAXPHYADDR`.
    #[bits(52)]
    pub base_page: u64,
}

impl MtrrPhysBase {
    pub const MSR_BASE: Msr = Msr::new(0x200);

    #[inline]
    #[must_use]
    pub const fn with_range_type(self, ty: MemoryType) -> Self {
        self.with_mem_type(ty.into_bits())
    }
}

/// `IA32_MTRR_PHYSMASKn` (MSR `0x201 + 2n`).
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct MtrrPhysMask {
    /// Bits 0–10 — Reserved.
    #[bits(11)]
    pub reserved_0_10: u16,

    /// Bit 11 — V: the pair is valid and participates in decoding.
    pub valid: bool,

    /// Bits 12–63 — page-number mask.
    ///
    /// Modeled at full width; callers mask it with `MAXPHYADDR`.
    #[bits(52)]
    pub mask_page: u64,
}

impl MtrrPhysMask {
    pub const MSR_BASE: Msr = Msr::new(0x201);
}
