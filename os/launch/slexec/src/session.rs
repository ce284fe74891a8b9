use crate::arch::Architecture;
use crate::cmdline::{CMDLINE_SIZE, CmdlineBuffer, LaunchConfig};
use crate::error::SlError;
use crate::loader::LoaderContext;
use crate::shutdown::ShutdownPolicy;
use launch_registers::msr::Ia32ApicBase;
use log::error;

/// State of one launch attempt.
///
/// Every field is filled in once during the early steps and only read
/// afterwards. Setting the architecture or the APIC base a second time is
/// an error.
#[derive(Debug, Clone)]
pub struct BootSession {
    loader: Option<LoaderContext>,
    cmdline: CmdlineBuffer<CMDLINE_SIZE>,
    config: LaunchConfig,
    arch: Architecture,
    apic_base: Option<Ia32ApicBase>,
    policy: ShutdownPolicy,
}

impl Default for BootSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BootSession {
    /// Fresh session with the default (power cycle reboot) fatal policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: None,
            cmdline: CmdlineBuffer::new(),
            config: LaunchConfig::default(),
            arch: Architecture::None,
            apic_base: None,
            policy: ShutdownPolicy::default(),
        }
    }

    #[must_use]
    pub const fn loader(&self) -> Option<&LoaderContext> {
        self.loader.as_ref()
    }

    #[must_use]
    pub const fn cmdline(&self) -> &CmdlineBuffer<CMDLINE_SIZE> {
        &self.cmdline
    }

    #[must_use]
    pub const fn config(&self) -> &LaunchConfig {
        &self.config
    }

    #[must_use]
    pub const fn architecture(&self) -> Architecture {
        self.arch
    }

    #[must_use]
    pub const fn apic_base(&self) -> Option<Ia32ApicBase> {
        self.apic_base
    }

    #[must_use]
    pub const fn policy(&self) -> &ShutdownPolicy {
        &self.policy
    }

    pub(crate) fn set_loader(&mut self, loader: LoaderContext) {
        self.loader = Some(loader);
    }

    pub(crate) fn set_cmdline(&mut self, cmdline: CmdlineBuffer<CMDLINE_SIZE>) {
        self.cmdline = cmdline;
    }

    /// Adopt the parsed configuration; the shutdown action takes effect for
    /// every later fatal error.
    pub(crate) fn configure(&mut self, config: LaunchConfig) {
        self.policy.action = config.shutdown_action;
        self.config = config;
    }

    pub(crate) fn set_architecture(&mut self, arch: Architecture) -> Result<(), SlError> {
        if self.arch != Architecture::None {
            error!("architecture already set to {}", self.arch);
            return Err(SlError::Fatal);
        }
        self.arch = arch;
        Ok(())
    }

    pub(crate) fn set_apic_base(&mut self, apic_base: Ia32ApicBase) -> Result<(), SlError> {
        if self.apic_base.is_some() {
            error!("APIC base already recorded");
            return Err(SlError::Fatal);
        }
        self.apic_base = Some(apic_base);
        Ok(())
    }
}
