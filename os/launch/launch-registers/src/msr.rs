//! # Model-Specific Registers
//!
//! The launcher reads and writes a small, fixed set of MSRs:
//!
//! | Index                  | Register                | Model                     |
//! |------------------------|-------------------------|---------------------------|
//! | `0x1B`                 | `IA32_APIC_BASE`        | [`Ia32ApicBase`]          |
//! | `0x3A`                 | `IA32_FEATURE_CONTROL`  | [`Ia32FeatureControl`]    |
//! | `0xFE`                 | `IA32_MTRRCAP`          | [`MtrrCap`]               |
//! | `0x179`                | `IA32_MCG_CAP`          | [`McgCap`]                |
//! | `0x17A`                | `IA32_MCG_STATUS`       | [`McgStatus`]             |
//! | `0x200 + 2n`           | `IA32_MTRR_PHYSBASEn`   | [`MtrrPhysBase`]          |
//! | `0x201 + 2n`           | `IA32_MTRR_PHYSMASKn`   | [`MtrrPhysMask`]          |
//! | `0x2FF`                | `IA32_MTRR_DEF_TYPE`    | [`MtrrDefType`]           |
//! | `0x401 + 4i`           | `IA32_MCi_STATUS`       | [`McStatus`]              |
//! | `0xC001_0114`          | `VM_CR` (AMD)           | [`VmCr`]                  |
//!
//! ## References
//! - Intel SDM Vol. 3A, §11.11 "Memory Type Range Registers", §15.3 "Machine-Check MSRs"
//! - Intel SDM Vol. 2D, "GETSEC—GETSEC\[SENTER\]"
//! - AMD64 APM Vol. 2, §15.27 "Secure Startup with SKINIT"

mod ia32_apic_base;
mod ia32_feature_control;
mod machine_check;
mod mtrr;
mod vm_cr;

pub use ia32_apic_base::Ia32ApicBase;
pub use ia32_feature_control::Ia32FeatureControl;
pub use machine_check::{McStatus, McgCap, McgStatus};
pub use mtrr::{MemoryType, MtrrCap, MtrrDefType, MtrrPhysBase, MtrrPhysMask};
pub use vm_cr::VmCr;

/// Identifies a **Model-Specific Register (MSR)** by its architectural index.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Msr(pub u32);

impl Msr {
    /// Creates a new `Msr` from a raw index.
    #[inline(always)]
    #[allow(clippy::inline_always)]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the underlying raw MSR index.
    #[inline(always)]
    #[allow(clippy::inline_always)]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// `IA32_MTRR_PHYSBASEn` for variable range `n`.
    #[inline]
    #[must_use]
    pub const fn mtrr_physbase(n: u32) -> Self {
        Self(MtrrPhysBase::MSR_BASE.0 + 2 * n)
    }

    /// `IA32_MTRR_PHYSMASKn` for variable range `n`.
    #[inline]
    #[must_use]
    pub const fn mtrr_physmask(n: u32) -> Self {
        Self(MtrrPhysMask::MSR_BASE.0 + 2 * n)
    }

    /// `IA32_MCi_STATUS` for machine-check bank `i`.
    #[inline]
    #[must_use]
    pub const fn mc_status(bank: u32) -> Self {
        Self(McStatus::MSR_BASE.0 + 4 * bank)
    }

    /// Write a 64-bit value to this MSR.
    ///
    /// # Safety
    /// - Executes the privileged `WRMSR` instruction; CPL 0 only.
    /// - The MSR must exist and accept the value, otherwise the CPU raises `#GP(0)`.
    #[cfg(feature = "asm")]
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    #[doc(alias = "wrmsr")]
    pub unsafe fn store_raw(self, val: u64) {
        let lo = (val & 0xFFFF_FFFF) as u32;
        let hi = (val >> 32) as u32;
        unsafe {
            core::arch::asm!(
                "wrmsr",
                in("ecx") self.raw(),
                in("eax") lo,
                in("edx") hi,
                options(nostack, preserves_flags)
            );
        }
    }

    /// Read the 64-bit value of this MSR.
    ///
    /// # Safety
    /// Executes the privileged `RDMSR` instruction; the MSR must exist.
    #[cfg(feature = "asm")]
    #[inline]
    #[doc(alias = "rdmsr")]
    pub unsafe fn load_raw(self) -> u64 {
        let lo: u32;
        let hi: u32;
        unsafe {
            core::arch::asm!(
                "rdmsr",
                in("ecx") self.raw(),
                out("eax") lo,
                out("edx") hi,
                options(nomem, nostack, preserves_flags)
            );
        }
        (u64::from(hi) << 32) | u64::from(lo)
    }
}
