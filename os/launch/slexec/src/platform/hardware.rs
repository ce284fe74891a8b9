use super::{CpuidResult, GetsecParameterLeaf, Platform};
use launch_registers::msr::Msr;
use launch_registers::{Cr0, Cr4, LoadRegisterUnsafe, Rflags, StoreRegisterUnsafe};

const GETSEC_CAPABILITIES: u32 = 0;
const GETSEC_SENTER: u32 = 4;
const GETSEC_PARAMETERS: u32 = 6;

/// [`Platform`] backed by the executing processor.
#[derive(Debug)]
pub struct HardwarePlatform {
    _private: (),
}

impl HardwarePlatform {
    /// # Safety
    /// The caller runs at CPL 0 on the bootstrap processor with no other
    /// code touching control registers, MTRRs or the reset ports.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Platform for HardwarePlatform {
    fn cpuid_available(&mut self) -> bool {
        unsafe {
            let original = Rflags::load_unsafe();
            Rflags::from_bits(original.into_bits() ^ Rflags::ID_MASK).store_unsafe();
            let toggled = Rflags::load_unsafe();
            original.store_unsafe();
            (original.into_bits() ^ toggled.into_bits()) & Rflags::ID_MASK != 0
        }
    }

    #[allow(unused_assignments)]
    fn cpuid(&mut self, leaf: u32, subleaf: u32) -> CpuidResult {
        let (mut eax, mut ebx, mut ecx, mut edx) = (leaf, 0u32, subleaf, 0u32);
        unsafe {
            core::arch::asm!(
                "push rbx",
                "cpuid",
                "mov {ebx_out:e}, ebx",
                "pop rbx",
                ebx_out = lateout(reg) ebx,
                inlateout("eax") eax,
                inlateout("ecx") ecx,
                lateout("edx") edx,
                options(nomem, preserves_flags),
            );
        }
        CpuidResult { eax, ebx, ecx, edx }
    }

    fn read_cr0(&mut self) -> Cr0 {
        unsafe { Cr0::load_unsafe() }
    }

    fn write_cr0(&mut self, value: Cr0) {
        unsafe { value.store_unsafe() }
    }

    fn read_cr4(&mut self) -> Cr4 {
        unsafe { Cr4::load_unsafe() }
    }

    fn write_cr4(&mut self, value: Cr4) {
        unsafe { value.store_unsafe() }
    }

    fn read_rflags(&mut self) -> Rflags {
        unsafe { Rflags::load_unsafe() }
    }

    fn write_rflags(&mut self, value: Rflags) {
        unsafe { value.store_unsafe() }
    }

    fn disable_interrupts(&mut self) {
        unsafe { core::arch::asm!("cli", options(nomem, nostack)) }
    }

    fn rdmsr(&mut self, msr: Msr) -> u64 {
        unsafe { msr.load_raw() }
    }

    fn wrmsr(&mut self, msr: Msr, value: u64) {
        unsafe { msr.store_raw(value) }
    }

    fn wbinvd(&mut self) {
        unsafe { core::arch::asm!("wbinvd", options(nostack, preserves_flags)) }
    }

    fn getsec_capabilities(&mut self, index: u32) -> u32 {
        let eax: u32;
        // RBX is reserved by the compiler; swap the index in and out around GETSEC.
        unsafe {
            core::arch::asm!(
                "xchg {idx}, rbx",
                ".byte 0x0f, 0x37",
                "xchg {idx}, rbx",
                idx = inout(reg) u64::from(index) => _,
                inout("eax") GETSEC_CAPABILITIES => eax,
                options(nostack),
            );
        }
        eax
    }

    #[allow(clippy::cast_possible_truncation)]
    fn getsec_parameters(&mut self, index: u32) -> GetsecParameterLeaf {
        let eax: u32;
        let ecx: u32;
        let mut rbx = u64::from(index);
        unsafe {
            core::arch::asm!(
                "xchg {b}, rbx",
                ".byte 0x0f, 0x37",
                "xchg {b}, rbx",
                b = inout(reg) rbx,
                inout("eax") GETSEC_PARAMETERS => eax,
                lateout("ecx") ecx,
                options(nostack),
            );
        }
        GetsecParameterLeaf {
            eax,
            ebx: rbx as u32,
            ecx,
        }
    }

    fn getsec_senter(&mut self, sinit_base: u32, sinit_size: u32) -> ! {
        unsafe {
            core::arch::asm!(
                "mov ebx, {base:e}",
                ".byte 0x0f, 0x37",
                base = in(reg) sinit_base,
                in("eax") GETSEC_SENTER,
                in("ecx") sinit_size,
                in("edx") 0u32,
                options(noreturn),
            )
        }
    }

    fn skinit(&mut self, slb: u32) -> ! {
        unsafe { core::arch::asm!(".byte 0x0f, 0x01, 0xde", in("eax") slb, options(noreturn)) }
    }

    fn outb(&mut self, port: u16, value: u8) {
        unsafe {
            core::arch::asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
        }
    }

    fn halt(&mut self) -> ! {
        loop {
            unsafe { core::arch::asm!("cli", "hlt", options(nomem, nostack)) }
        }
    }
}
