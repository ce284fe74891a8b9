//! # Intel TXT launch steps
//!
//! Platform support, the error record a previous launch may have left in
//! the TXT public space, and the final `GETSEC[SENTER]`.

use crate::error::SlError;
use crate::loader::LoaderContext;
use crate::mtrr::{self, ModuleFootprint};
use crate::platform::Platform;
use crate::services::{SinitModule, TxtChipset};
use crate::smx;
use bitfield_struct::bitfield;
use core::convert::Infallible;
use launch_registers::msr::{Ia32FeatureControl, MemoryType};
use log::{error, info};

/// `TXT.ESTS`, public space offset.
pub const TXTCR_ESTS: u32 = 0x008;
/// `TXT.ERRORCODE`, public space offset.
pub const TXTCR_ERRORCODE: u32 = 0x030;
/// `TXT.E2STS`, public space offset.
pub const TXTCR_E2STS: u32 = 0x8F0;

const CPUID1_ECX_SMX: u32 = 1 << 6;

/// `TXT.ERRORCODE` values that do not indicate a failed launch.
const BENIGN_ERRORCODES: [u64; 3] = [0, 0xC000_0001, 0xC000_0009];

/// `TXT.ERRORCODE`.
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct TxtErrorCode {
    /// Bits 0–14 — source-specific.
    #[bits(15)]
    pub type1: u16,

    /// Bit 15 — 0: the ACM reported, 1: something else did.
    pub source_other: bool,

    /// Bits 16–29 — source-specific.
    #[bits(14)]
    pub type2: u16,

    /// Bit 30 — 0: processor, 1: external software.
    pub external: bool,

    /// Bit 31 — the code is valid.
    pub valid: bool,

    #[bits(32)]
    pub reserved_32_63: u32,
}

/// The source-specific part of [`TxtErrorCode`] when an ACM reported.
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct AcmErrorCode {
    /// Bits 0–3 — 0: BIOS ACM, 1: SINIT.
    #[bits(4)]
    pub acm_type: u8,

    #[bits(6)]
    pub progress: u8,

    #[bits(5)]
    pub error: u8,

    /// Bit 15 — always 0 for ACM codes.
    pub source_other: bool,

    #[bits(14)]
    pub minor: u16,

    #[bits(34)]
    pub reserved_30_63: u64,
}

/// `TXT.ESTS`.
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct TxtEsts {
    pub txt_reset: bool,

    #[bits(63)]
    pub reserved_1_63: u64,
}

/// `TXT.E2STS`.
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct TxtE2sts {
    pub slp_entry_error: bool,
    pub secrets: bool,
    pub block_mem: bool,
    pub reset: bool,

    #[bits(60)]
    pub reserved_4_63: u64,
}

/// The three error registers as left by the last launch attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TxtErrorRecord {
    pub errorcode: TxtErrorCode,
    pub ests: TxtEsts,
    pub e2sts: TxtE2sts,
}

impl TxtErrorRecord {
    pub fn read<C: TxtChipset + ?Sized>(chipset: &C) -> Self {
        Self {
            errorcode: TxtErrorCode::from_bits(chipset.read_config_reg(TXTCR_ERRORCODE)),
            ests: TxtEsts::from_bits(chipset.read_config_reg(TXTCR_ESTS)),
            e2sts: TxtE2sts::from_bits(chipset.read_config_reg(TXTCR_E2STS)),
        }
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        !BENIGN_ERRORCODES.contains(&self.errorcode.into_bits())
    }

    /// Log the record, decoded as far as the source is known.
    pub fn display(&self) {
        let code = self.errorcode;
        info!("TXT.ERRORCODE: {:#x}", code.into_bits());
        if code.valid() {
            if code.external() {
                info!("  external error {:#x}/{:#x}", code.type2(), code.type1());
            } else if code.source_other() {
                info!("  processor error {:#x}", code.type1());
            } else {
                let acm = AcmErrorCode::from_bits(code.into_bits());
                info!(
                    "  {} ACM: progress {:#04x}, error {:#x}, minor {:#x}",
                    if acm.acm_type() == 1 { "SINIT" } else { "BIOS" },
                    acm.progress(),
                    acm.error(),
                    acm.minor()
                );
            }
        }
        info!("TXT.ESTS: {:#x}, TXT_RESET.STS: {}", self.ests.into_bits(), self.ests.txt_reset());
        info!(
            "TXT.E2STS: {:#x}, SECRETS.STS: {}, BLOCK_MEM.STS: {}",
            self.e2sts.into_bits(),
            self.e2sts.secrets(),
            self.e2sts.block_mem()
        );
    }
}

/// Check that SMX and a TXT chipset are usable and leave `CR4.SMXE` set.
///
/// # Errors
/// [`SlError::SmxNotSupported`] if the CPU lacks SMX or firmware did not
/// enable SENTER; [`SlError::TxtNotSupported`] if the chipset or a needed
/// `GETSEC` leaf is missing, with `CR4.SMXE` cleared again.
pub fn supports_txt<P: Platform>(platform: &mut P) -> Result<(), SlError> {
    if platform.cpuid(1, 0).ecx & CPUID1_ECX_SMX == 0 {
        error!("CPU does not support SMX");
        return Err(SlError::SmxNotSupported);
    }
    info!("CPU is SMX-capable");

    let feature_control = Ia32FeatureControl::from_bits(platform.rdmsr(Ia32FeatureControl::MSR));
    if !feature_control.senter_allowed() {
        error!(
            "SENTER disabled by IA32_FEATURE_CONTROL ({:#x})",
            feature_control.into_bits()
        );
        return Err(SlError::SmxNotSupported);
    }

    let cr4 = platform.read_cr4();
    platform.write_cr4(cr4.with_smxe(true));
    info!("SMX is enabled");

    let caps = smx::capabilities(platform);
    if caps.launch_capable() {
        info!("TXT chipset and all needed capabilities present");
        return Ok(());
    }
    if caps.chipset_present() {
        error!("insufficient SMX capabilities ({:#x})", caps.into_bits());
    } else {
        error!("TXT-capable chipset not present");
    }

    let cr4 = platform.read_cr4();
    platform.write_cr4(cr4.with_smxe(false));
    Err(SlError::TxtNotSupported)
}

/// Snapshot the MTRRs for the measured environment, map SINIT write-back
/// and execute `GETSEC[SENTER]`.
///
/// # Errors
/// The MTRRs cannot be saved, building the TXT heap failed or the module
/// cannot be mapped. Only returns on error.
pub fn launch_environment<P: Platform, C: TxtChipset + ?Sized>(
    platform: &mut P,
    chipset: &mut C,
    ctx: &LoaderContext,
    sinit: &SinitModule,
) -> Result<Infallible, SlError> {
    let saved = mtrr::save(platform).inspect_err(|e| error!("cannot save MTRRs: {e}"))?;
    chipset.prepare_launch(ctx, sinit, &saved)?;

    let footprint = ModuleFootprint {
        base: u64::from(sinit.base),
        size: u64::from(sinit.size),
        mem_type: MemoryType::WriteBack,
    };
    if let Err(e) = mtrr::configure_for_module(platform, &footprint) {
        error!("cannot map SINIT: {e}");
        return Err(e.into());
    }

    info!("executing GETSEC[SENTER] with SINIT at {:#x}", sinit.base);
    platform.getsec_senter(sinit.base, sinit.size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimEvent, SimPlatform};

    #[test]
    fn benign_codes() {
        for raw in [0, 0xC000_0001, 0xC000_0009] {
            let record = TxtErrorRecord {
                errorcode: TxtErrorCode::from_bits(raw),
                ests: TxtEsts::new(),
                e2sts: TxtE2sts::new(),
            };
            assert!(!record.has_error(), "{raw:#x}");
        }
    }

    #[test]
    fn acm_error_is_reported() {
        let code = TxtErrorCode::from_bits(0x8000_0000 | (0x0C << 10) | (0x1A << 4) | 1);
        assert!(code.valid());
        assert!(!code.source_other());
        let acm = AcmErrorCode::from_bits(code.into_bits());
        assert_eq!(acm.acm_type(), 1);
        assert_eq!(acm.progress(), 0x1A);
        assert_eq!(acm.error(), 0x0C);
        let record = TxtErrorRecord {
            errorcode: code,
            ests: TxtEsts::new(),
            e2sts: TxtE2sts::new(),
        };
        assert!(record.has_error());
    }

    #[test]
    fn supported_platform_keeps_smxe() {
        let mut sim = SimPlatform::intel();
        assert_eq!(supports_txt(&mut sim), Ok(()));
        assert!(sim.cr4.smxe());
        assert!(sim.has_event(|e| *e == SimEvent::GetsecCapabilities(0)));
    }

    #[test]
    fn cpu_without_smx() {
        let mut sim = SimPlatform::amd();
        assert_eq!(supports_txt(&mut sim), Err(SlError::SmxNotSupported));
        assert!(sim.events().is_empty());
    }

    #[test]
    fn unlocked_feature_control() {
        let mut sim = SimPlatform::intel();
        let unlocked = Ia32FeatureControl::from_bits(sim.msr(Ia32FeatureControl::MSR)).with_lock(false);
        sim.set_msr(Ia32FeatureControl::MSR, unlocked.into_bits());
        assert_eq!(supports_txt(&mut sim), Err(SlError::SmxNotSupported));
        assert!(!sim.cr4.smxe());
    }

    #[test]
    fn missing_leaf_clears_smxe() {
        let mut sim = SimPlatform::intel();
        sim.getsec_caps &= !(1 << 8);
        assert_eq!(supports_txt(&mut sim), Err(SlError::TxtNotSupported));
        assert!(!sim.cr4.smxe());
    }

    #[test]
    fn missing_chipset_clears_smxe() {
        let mut sim = SimPlatform::intel();
        sim.getsec_caps = 0;
        assert_eq!(supports_txt(&mut sim), Err(SlError::TxtNotSupported));
        assert!(!sim.cr4.smxe());
    }
}
