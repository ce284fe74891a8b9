//! # Privileged instruction interface
//!
//! Everything above this module (detector, validator, MTRR manager,
//! orchestrator) reaches the CPU only through [`Platform`]. Two
//! implementations exist:
//!
//! * [`HardwarePlatform`] issues the real instructions (feature `asm`, x86-64).
//! * `SimPlatform` (feature `sim`) answers from fixed tables and
//!   records every side effect.
//!
//! The measured-launch entry instructions and the halt loop return `!`.

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
mod hardware;

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
pub use hardware::HardwarePlatform;

use launch_registers::msr::Msr;
use launch_registers::{Cr0, Cr4, Rflags};

/// Register values returned by `CPUID`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct CpuidResult {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// Raw output of one `GETSEC[PARAMETERS]` query.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GetsecParameterLeaf {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
}

impl GetsecParameterLeaf {
    /// Parameter type, `EAX[4:0]`.
    #[must_use]
    pub const fn param_type(&self) -> u32 {
        self.eax & 0x1F
    }
}

/// Processor operations needed to prepare and perform a measured launch.
pub trait Platform {
    /// Whether `RFLAGS.ID` can be toggled, i.e. `CPUID` exists.
    fn cpuid_available(&mut self) -> bool;

    fn cpuid(&mut self, leaf: u32, subleaf: u32) -> CpuidResult;

    fn read_cr0(&mut self) -> Cr0;
    fn write_cr0(&mut self, value: Cr0);

    fn read_cr4(&mut self) -> Cr4;
    fn write_cr4(&mut self, value: Cr4);

    fn read_rflags(&mut self) -> Rflags;
    fn write_rflags(&mut self, value: Rflags);

    /// `CLI`.
    fn disable_interrupts(&mut self);

    fn rdmsr(&mut self, msr: Msr) -> u64;
    fn wrmsr(&mut self, msr: Msr, value: u64);

    /// Write back and invalidate all caches.
    fn wbinvd(&mut self);

    /// `GETSEC[CAPABILITIES]`, returns `EAX`. Requires `CR4.SMXE`.
    fn getsec_capabilities(&mut self, index: u32) -> u32;

    /// `GETSEC[PARAMETERS]`. Requires `CR4.SMXE`.
    fn getsec_parameters(&mut self, index: u32) -> GetsecParameterLeaf;

    /// `GETSEC[SENTER]` with the SINIT module at `sinit_base`.
    fn getsec_senter(&mut self, sinit_base: u32, sinit_size: u32) -> !;

    /// `SKINIT` with the secure loader block at `slb`.
    fn skinit(&mut self, slb: u32) -> !;

    fn outb(&mut self, port: u16, value: u8);

    /// Stop this processor for good.
    fn halt(&mut self) -> !;
}
