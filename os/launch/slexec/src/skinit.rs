use crate::error::SlError;
use crate::platform::Platform;
use crate::services::SklModule;
use launch_registers::Efer;
use launch_registers::msr::VmCr;
use log::{error, info};

const CPUID_EXT_FEATURES: u32 = 0x8000_0001;
const CPUID_EXT_ECX_SVM: u32 = 1 << 2;
const CPUID_EXT_ECX_SKINIT: u32 = 1 << 12;

/// Check for SVM and `SKINIT` and turn on `EFER.SVME`.
///
/// # Errors
/// [`SlError::SkinitNotSupported`] if either feature is missing or firmware
/// disabled SVM.
pub fn supports_skinit<P: Platform>(platform: &mut P) -> Result<(), SlError> {
    let ecx = platform.cpuid(CPUID_EXT_FEATURES, 0).ecx;
    if ecx & CPUID_EXT_ECX_SVM == 0 {
        error!("CPU does not support SVM");
        return Err(SlError::SkinitNotSupported);
    }
    if ecx & CPUID_EXT_ECX_SKINIT == 0 {
        error!("CPU does not support SKINIT");
        return Err(SlError::SkinitNotSupported);
    }

    let vm_cr = VmCr::from_bits(platform.rdmsr(VmCr::MSR));
    if vm_cr.svmdis() {
        error!("SVM disabled by firmware (VM_CR {:#x})", vm_cr.into_bits());
        return Err(SlError::SkinitNotSupported);
    }

    let efer = Efer::from_bits(platform.rdmsr(Efer::MSR));
    if !efer.svme() {
        platform.wrmsr(Efer::MSR, efer.with_svme(true).into_bits());
    }
    info!("SKINIT CPU and all needed capabilities present");
    Ok(())
}

/// Execute `SKINIT` on the secure loader block.
pub fn launch_environment<P: Platform>(platform: &mut P, skl: &SklModule) -> ! {
    info!("SKINIT launch, SLB at {:#x}", skl.base);
    platform.skinit(skl.base)
}
