use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// CR0 as seen by the pre-launch code.
///
/// The measured-launch entry instructions require protected mode, caching
/// enabled (`CD = NW = 0`) and native x87 error reporting (`NE = 1`). The
/// upper half is modeled as an opaque field so a raw value read from the CPU
/// survives a write-back unchanged.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct Cr0 {
    /// Bit 0 — PE: Protection Enable.
    pub pe_protection_enable: bool,

    /// Bit 1 — MP: Monitor Coprocessor.
    pub mp_monitor_coprocessor: bool,

    /// Bit 2 — EM: x87 Emulation.
    pub em_emulation: bool,

    /// Bit 3 — TS: Task Switched.
    pub ts_task_switched: bool,

    /// Bit 4 — ET: Extension Type (hardwired to 1 on modern CPUs).
    pub et_extension_type: bool,

    /// Bit 5 — NE: Numeric Error.
    ///
    /// - 1: x87 errors raise `#MF`.
    /// - 0: legacy IRQ 13 / `FERR#` reporting.
    pub ne_numeric_error: bool,

    /// Bits 6–15 — Reserved.
    #[bits(10)]
    pub reserved_6_15: u16,

    /// Bit 16 — WP: Write Protect.
    pub wp_write_protect: bool,

    /// Bit 17 — Reserved.
    pub reserved_17: bool,

    /// Bit 18 — AM: Alignment Mask.
    pub am_alignment_mask: bool,

    /// Bits 19–28 — Reserved.
    #[bits(10)]
    pub reserved_19_28: u16,

    /// Bit 29 — NW: Not Write-through.
    pub nw_not_write_through: bool,

    /// Bit 30 — CD: Cache Disable.
    pub cd_cache_disable: bool,

    /// Bit 31 — PG: Paging.
    pub pg_paging: bool,

    /// Bits 32–63 — Reserved.
    #[bits(32)]
    pub reserved_32_63: u32,
}

impl Cr0 {
    /// Whether the cache is in its normal, fully enabled mode (`CD = NW = 0`).
    #[inline]
    #[must_use]
    pub const fn caching_enabled(&self) -> bool {
        !self.cd_cache_disable() && !self.nw_not_write_through()
    }

    /// The "no-fill" cache mode used while memory types are reprogrammed:
    /// `CD = 1`, `NW = 0`.
    #[inline]
    #[must_use]
    pub const fn with_cache_no_fill(self) -> Self {
        self.with_cd_cache_disable(true)
            .with_nw_not_write_through(false)
    }
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Cr0 {
    unsafe fn load_unsafe() -> Self {
        let cr0: u64;
        unsafe {
            core::arch::asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr0)
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Cr0 {
    unsafe fn store_unsafe(self) {
        let cr0 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr0, {}", in(reg) cr0, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_bits_sit_at_29_and_30() {
        let cr0 = Cr0::new()
            .with_cd_cache_disable(true)
            .with_nw_not_write_through(true);
        assert_eq!(cr0.into_bits(), (1 << 30) | (1 << 29));
        assert!(!cr0.caching_enabled());
    }

    #[test]
    fn no_fill_mode_keeps_other_bits() {
        let raw = 0x8000_0031_u64 | (1 << 29);
        let cr0 = Cr0::from_bits(raw).with_cache_no_fill();
        assert_eq!(cr0.into_bits(), 0x8000_0031 | (1 << 30));
    }

    #[test]
    fn raw_value_round_trips() {
        let raw = 0xDEAD_BEEF_6000_0033;
        assert_eq!(Cr0::from_bits(raw).into_bits(), raw);
    }
}
