//! # Launch collaborators
//!
//! The orchestrator owns the decisions; everything that parses loader data,
//! talks to the TPM, checks module signatures or pokes chipset registers is
//! behind one of these traits. [`LaunchServices`] bundles them so
//! [`begin_launch`](crate::begin_launch) takes a single value.

use crate::cmdline::LaunchConfig;
use crate::error::SlError;
use crate::loader::LoaderContext;
use crate::mtrr::MtrrSnapshot;

/// A module located in physical memory below 4 GiB.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PhysModule {
    pub base: u32,
    /// Size in bytes.
    pub size: u32,
}

/// The Intel SINIT authenticated code module.
pub type SinitModule = PhysModule;

/// The AMD secure loader block.
pub type SklModule = PhysModule;

/// Access to what the boot loader handed over.
pub trait LoaderOps {
    /// Raw command line, if the loader passed one.
    fn cmdline(&self, ctx: &LoaderContext) -> Option<&[u8]>;

    /// Make a private copy of the firmware memory map.
    fn copy_memory_map(&mut self, ctx: &LoaderContext) -> bool;

    /// Whether the modules the measured environment needs are present.
    fn verify_modules(&self, ctx: &LoaderContext) -> bool;

    fn find_sinit(&mut self, ctx: &LoaderContext) -> Option<SinitModule>;

    fn find_skl(&mut self, ctx: &LoaderContext) -> Option<SklModule>;

    /// Locate and set up the loader that runs inside the measured
    /// environment.
    fn prepare_intermediate_loader(&mut self, ctx: &LoaderContext) -> bool;
}

pub trait Tpm {
    fn detect(&mut self) -> bool;

    /// Locality and startup preparation.
    fn prepare(&mut self) -> bool;
}

pub trait AcmVerifier {
    fn verify(&self, sinit: &SinitModule) -> bool;

    /// Advisory security version number check.
    fn svn_status_ok(&self, sinit: &SinitModule) -> bool;
}

/// TXT chipset access.
pub trait TxtChipset {
    /// Pick between the module from the loader and the one firmware
    /// provided, placing the newer one in the SINIT region.
    fn copy_sinit(&mut self, found: Option<SinitModule>) -> Option<SinitModule>;

    /// Read a TXT public configuration register.
    fn read_config_reg(&self, offset: u32) -> u64;

    /// Platform eligibility for measured launch.
    ///
    /// # Errors
    /// The code that explains why the platform cannot launch.
    fn verify_platform(&mut self) -> Result<(), SlError>;

    /// Build the TXT heap; `saved_mtrrs` goes into the OS to MLE data so
    /// the measured environment can restore it.
    ///
    /// # Errors
    /// The heap cannot be built.
    fn prepare_launch(
        &mut self,
        ctx: &LoaderContext,
        sinit: &SinitModule,
        saved_mtrrs: &MtrrSnapshot,
    ) -> Result<(), SlError>;
}

pub trait SkinitChipset {
    /// Move the secure loader to its launch location.
    fn relocate_skl(&mut self, skl: SklModule) -> SklModule;

    /// Fill the bootloader data area the secure loader consumes.
    fn prepare_bootloader_data(&mut self, skl: &SklModule, ctx: &LoaderContext) -> bool;
}

pub trait Logging {
    /// Install the log sinks. Called once, before any other output.
    fn init_logging(&mut self, config: &LaunchConfig) {
        // A logger installed earlier keeps working, only its settings change.
        let _ = launch_log::init(config.log_level, config.log_targets);
    }
}

/// Everything [`begin_launch`](crate::begin_launch) needs besides the
/// processor.
pub trait LaunchServices: LoaderOps + Tpm + AcmVerifier + TxtChipset + SkinitChipset + Logging {}

impl<T> LaunchServices for T where T: LoaderOps + Tpm + AcmVerifier + TxtChipset + SkinitChipset + Logging {}
