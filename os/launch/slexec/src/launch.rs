//! # Launch sequence
//!
//! [`begin_launch`] runs the whole attempt and never returns: it either
//! ends in `GETSEC[SENTER]`/`SKINIT` or in the shutdown policy.
//!
//! ```text
//!  1  loader protocol from the entry magic
//!  2  copy the command line
//!  3  parse options, fix the fatal action
//!  4  logging
//!  5  CPU vendor -> Intel TXT | AMD SKINIT
//!  6  must be the BSP
//!  7  copy the memory map
//!  8  TPM present
//!  9  Intel: TXT support, GETSEC parameters, SINIT (find, copy, verify,
//!           size), SVN status, previous launch errors, platform check
//!     AMD:   SKINIT support, find and relocate the SKL
//! 10  loader modules present
//! 11  CPU preconditions
//! 12  TPM ready
//! 13  intermediate loader
//! 14  Intel: MTRR snapshot, TXT heap, SINIT mapping, GETSEC[SENTER]
//!     AMD:   bootloader data, SKINIT
//! ```

use crate::arch::{self, Architecture};
use crate::cmdline::{CmdlineBuffer, LaunchConfig};
use crate::cpu;
use crate::error::SlError;
use crate::loader::LoaderContext;
use crate::platform::Platform;
use crate::services::{AcmVerifier, LaunchServices, SinitModule, SklModule, Tpm, TxtChipset};
use crate::session::BootSession;
use crate::skinit;
use crate::smx;
use crate::txt::{self, TxtErrorRecord};
use core::convert::Infallible;
use launch_registers::msr::Ia32ApicBase;
use log::{error, info, warn};

/// The module the final step hands control to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum LaunchTarget {
    Sinit(SinitModule),
    Skl(SklModule),
}

/// Perform a measured launch. `addr` and `magic` are what the boot loader
/// passed in `EBX` and `EAX`.
///
/// Any failure ends in
/// [`ShutdownPolicy::error_action`](crate::shutdown::ShutdownPolicy::error_action), using the action
/// from the command line once it has been parsed and rebooting before that.
pub fn begin_launch<P: Platform, S: LaunchServices>(
    platform: &mut P,
    services: &mut S,
    addr: usize,
    magic: u32,
) -> ! {
    let mut session = BootSession::new();
    let Err(err) = launch_sequence(platform, services, &mut session, addr, magic);
    let policy = *session.policy();
    policy.error_action(platform, Err(err));
    // error_action does not come back with an error
    platform.halt()
}

fn launch_sequence<P: Platform, S: LaunchServices>(
    platform: &mut P,
    services: &mut S,
    session: &mut BootSession,
    addr: usize,
    magic: u32,
) -> Result<Infallible, SlError> {
    let loader = LoaderContext::detect(addr, magic)?;
    session.set_loader(loader);

    session.set_cmdline(CmdlineBuffer::copy_from(services.cmdline(&loader)));
    let config = LaunchConfig::parse(session.cmdline().as_str());
    session.configure(config);

    services.init_logging(session.config());
    info!("******************* SLEXEC *******************");
    info!("   {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!("**********************************************");
    info!("command line: {}", session.cmdline().as_str());

    let arch = arch::detect(platform)?;
    session.set_architecture(arch)?;

    let apic_base = Ia32ApicBase::from_bits(platform.rdmsr(Ia32ApicBase::MSR));
    session.set_apic_base(apic_base)?;
    if !apic_base.bsp() {
        error!("entry processor is not the BSP");
        return Err(SlError::Fatal);
    }
    let apic_id = platform.cpuid(1, 0).ebx >> 24;
    info!("BSP is cpu {apic_id}, APIC base MSR: {:#x}", apic_base.into_bits());

    if !services.copy_memory_map(&loader) {
        error!("failed to copy the memory map");
        return Err(SlError::Fatal);
    }

    if !Tpm::detect(services) {
        error!("TPM not detected");
        return Err(SlError::TpmNotReady);
    }

    let target = match arch {
        Architecture::IntelTxt => LaunchTarget::Sinit(prepare_txt(platform, services, session, &loader)?),
        Architecture::AmdSkinit => LaunchTarget::Skl(prepare_skinit(platform, services, &loader)?),
        Architecture::None => return Err(SlError::Fatal),
    };

    if !services.verify_modules(&loader) {
        error!("loader modules missing");
        return Err(SlError::Fatal);
    }

    cpu::prepare_cpu(platform, arch)?;

    if !Tpm::prepare(services) {
        error!("TPM preparation failed");
        return Err(SlError::TpmNotReady);
    }

    if !services.prepare_intermediate_loader(&loader) {
        error!("failed to prepare the intermediate loader");
        return Err(SlError::Fatal);
    }

    match target {
        LaunchTarget::Sinit(sinit) => txt::launch_environment(platform, services, &loader, &sinit),
        LaunchTarget::Skl(skl) => {
            if !services.prepare_bootloader_data(&skl, &loader) {
                error!("failed to prepare the SKL bootloader data");
                return Err(SlError::Fatal);
            }
            skinit::launch_environment(platform, &skl)
        }
    }
}

/// Step 9, Intel.
fn prepare_txt<P: Platform, S: LaunchServices>(
    platform: &mut P,
    services: &mut S,
    session: &BootSession,
    loader: &LoaderContext,
) -> Result<SinitModule, SlError> {
    // Also sets CR4.SMXE, which GETSEC needs from here on.
    txt::supports_txt(platform)?;
    let params = smx::query_parameters(platform)?;

    let found = services.find_sinit(loader);
    let Some(sinit) = services.copy_sinit(found) else {
        error!("no SINIT module");
        return Err(SlError::SinitNotPresent);
    };
    info!("SINIT at {:#x}, {:#x} bytes", sinit.base, sinit.size);

    if !AcmVerifier::verify(&*services, &sinit) {
        error!("SINIT verification failed");
        return Err(SlError::AcmodVerifyFailed);
    }
    if sinit.size > params.acm_max_size {
        error!(
            "SINIT size {:#x} exceeds the {:#x} bytes allowed",
            sinit.size, params.acm_max_size
        );
        return Err(SlError::AcmodVerifyFailed);
    }

    if !services.svn_status_ok(&sinit) {
        warn!("SINIT SVN status check failed");
    }

    let record = TxtErrorRecord::read(&*services);
    record.display();
    if record.has_error() {
        if session.config().ignore_prev_err {
            warn!("ignoring the error left by the previous launch");
        } else {
            return Err(SlError::PrevTxtError);
        }
    }

    TxtChipset::verify_platform(services)?;
    Ok(sinit)
}

/// Step 9, AMD.
fn prepare_skinit<P: Platform, S: LaunchServices>(
    platform: &mut P,
    services: &mut S,
    loader: &LoaderContext,
) -> Result<SklModule, SlError> {
    skinit::supports_skinit(platform)?;

    let Some(found) = services.find_skl(loader) else {
        error!("no secure loader module");
        return Err(SlError::SklNotPresent);
    };
    let skl = services.relocate_skl(found);
    info!("SKL at {:#x}, {:#x} bytes", skl.base, skl.size);
    Ok(skl)
}
