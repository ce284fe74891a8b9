use crate::arch::Architecture;
use crate::error::SlError;
use crate::platform::Platform;
use crate::smx;
use launch_registers::msr::{McStatus, McgCap, McgStatus, Msr};
use log::{error, info};

/// Bring the processor into the state the launch instruction expects.
///
/// Protected mode and the absence of an in-progress machine check are
/// checked first and nothing is written if either fails. Then `CR0.CD`,
/// `CR0.NW` are cleared, `CR0.NE` is set and `RFLAGS.VM` cleared, each
/// register written only if it changes. Finally every machine-check bank is
/// scanned; a logged error is fatal unless `GETSEC[PARAMETERS]` reports that
/// errors may be preserved (Intel only).
///
/// # Errors
/// [`SlError::Fatal`] on any check that cannot be corrected.
pub fn prepare_cpu<P: Platform>(platform: &mut P, arch: Architecture) -> Result<(), SlError> {
    // CPL 0 is implied by having gotten this far.
    let cr0 = platform.read_cr0();
    if !cr0.pe_protection_enable() {
        error!("not in protected mode");
        return Err(SlError::Fatal);
    }

    let mcg_status = McgStatus::from_bits(platform.rdmsr(McgStatus::MSR));
    if mcg_status.mcip() {
        error!("machine check in progress");
        return Err(SlError::Fatal);
    }

    let mut fixed = cr0;
    if cr0.cd_cache_disable() {
        info!("CR0.CD set");
        fixed = fixed.with_cd_cache_disable(false);
    }
    if cr0.nw_not_write_through() {
        info!("CR0.NW set");
        fixed = fixed.with_nw_not_write_through(false);
    }
    if !cr0.ne_numeric_error() {
        info!("CR0.NE not set");
        fixed = fixed.with_ne_numeric_error(true);
    }
    if fixed != cr0 {
        platform.write_cr0(fixed);
    }

    let rflags = platform.read_rflags();
    if rflags.vm_virtual_8086() {
        info!("RFLAGS.VM set");
        platform.write_rflags(rflags.with_vm_virtual_8086(false));
    }
    info!("CR0 and RFLAGS OK");

    let preserve_mce = if arch == Architecture::IntelTxt {
        let params = smx::query_parameters(platform).inspect_err(|_| {
            error!("GETSEC[PARAMETERS] failed");
        })?;
        if params.preserve_mce {
            info!("TXT supports preserving machine check errors");
        } else {
            info!("TXT: no machine check errors may be pending");
        }
        if params.proc_based_scrtm {
            info!("TXT CPU supports processor-based S-CRTM");
        }
        params.preserve_mce
    } else {
        false
    };

    let banks = McgCap::from_bits(platform.rdmsr(McgCap::MSR)).count();
    for bank in 0..u32::from(banks) {
        let status = McStatus::from_bits(platform.rdmsr(Msr::mc_status(bank)));
        if status.val() {
            error!("MC{bank}_STATUS = {:#018x}", status.into_bits());
            if !preserve_mce {
                return Err(SlError::Fatal);
            }
        }
    }
    info!("machine check banks OK");

    Ok(())
}
