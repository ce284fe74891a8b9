use crate::error::SlError;
use crate::platform::Platform;
use core::fmt;
use log::{error, info};

/// Chipset reset control register.
pub const RESET_CONTROL_PORT: u16 = 0xCF9;

/// Keyboard controller command port.
pub const KBC_COMMAND_PORT: u16 = 0x64;

/// Power action taken on a fatal error.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum ShutdownAction {
    #[default]
    Reboot,
    /// Accepted but not implemented; behaves like [`ShutdownAction::Halt`].
    Shutdown,
    Halt,
}

impl ShutdownAction {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reboot" => Some(Self::Reboot),
            "shutdown" => Some(Self::Shutdown),
            "halt" => Some(Self::Halt),
            _ => None,
        }
    }
}

impl fmt::Display for ShutdownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reboot => "reboot",
            Self::Shutdown => "shutdown",
            Self::Halt => "halt",
        })
    }
}

/// What the fatal path does.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShutdownPolicy {
    pub action: ShutdownAction,
    /// Reboot by power cycle through the reset control register instead of
    /// a keyboard controller reset.
    pub power_cycle: bool,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            action: ShutdownAction::Reboot,
            power_cycle: true,
        }
    }
}

impl ShutdownPolicy {
    /// Shut down if `result` carries an error, do nothing otherwise.
    ///
    /// Every failed launch ends here. An error never returns.
    pub fn error_action<P: Platform>(&self, platform: &mut P, result: Result<(), SlError>) {
        if let Err(err) = result {
            self.fatal(platform, err);
        }
    }

    /// Log `err` and perform the configured power action; the error arm of
    /// [`error_action`](Self::error_action).
    pub fn fatal<P: Platform>(&self, platform: &mut P, err: SlError) -> ! {
        error!("error action invoked for: {err} ({:#x})", err.code());
        shutdown_system(platform, self.action, self.power_cycle)
    }
}

/// Reset, power off or halt the platform.
///
/// A reset that does not take effect ends in the halt loop as well.
pub fn shutdown_system<P: Platform>(platform: &mut P, action: ShutdownAction, power_cycle: bool) -> ! {
    info!("shutdown_system() called for: {action}");

    match action {
        ShutdownAction::Reboot if power_cycle => {
            // full reset with power cycle, decoded by every TXT-capable chipset
            platform.outb(RESET_CONTROL_PORT, 0x0A);
            platform.outb(RESET_CONTROL_PORT, 0x0E);
        }
        ShutdownAction::Reboot => {
            platform.outb(KBC_COMMAND_PORT, 0xFE);
            // soft reset through the chipset if the keyboard controller ignored us
            platform.outb(RESET_CONTROL_PORT, 0x06);
        }
        // TODO: enter S5 through the ACPI PM1a control block.
        ShutdownAction::Shutdown | ShutdownAction::Halt => {}
    }

    platform.halt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{HALT_PANIC, SimEvent, SimPlatform};
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn run(policy: ShutdownPolicy) -> SimPlatform {
        let mut sim = SimPlatform::new();
        let result = catch_unwind(AssertUnwindSafe(|| policy.error_action(&mut sim, Err(SlError::Fatal))));
        let payload = result.unwrap_err();
        let msg = payload
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| payload.downcast_ref::<&str>().copied());
        assert_eq!(msg, Some(HALT_PANIC));
        sim
    }

    #[test]
    fn power_cycle_reboot() {
        let sim = run(ShutdownPolicy::default());
        assert_eq!(
            sim.events(),
            &[
                SimEvent::Outb { port: 0xCF9, value: 0x0A },
                SimEvent::Outb { port: 0xCF9, value: 0x0E },
                SimEvent::Halt,
            ]
        );
    }

    #[test]
    fn keyboard_controller_reboot() {
        let sim = run(ShutdownPolicy {
            action: ShutdownAction::Reboot,
            power_cycle: false,
        });
        assert_eq!(
            sim.events(),
            &[
                SimEvent::Outb { port: 0x64, value: 0xFE },
                SimEvent::Outb { port: 0xCF9, value: 0x06 },
                SimEvent::Halt,
            ]
        );
    }

    #[test]
    fn shutdown_and_halt_only_halt() {
        for action in [ShutdownAction::Shutdown, ShutdownAction::Halt] {
            let sim = run(ShutdownPolicy {
                action,
                power_cycle: true,
            });
            assert_eq!(sim.events(), &[SimEvent::Halt]);
        }
    }

    #[test]
    fn success_is_a_noop() {
        let mut sim = SimPlatform::intel();
        ShutdownPolicy::default().error_action(&mut sim, Ok(()));
        assert!(sim.events().is_empty());
    }

    #[test]
    fn parse_actions() {
        assert_eq!(ShutdownAction::parse("halt"), Some(ShutdownAction::Halt));
        assert_eq!(ShutdownAction::parse("reboot"), Some(ShutdownAction::Reboot));
        assert_eq!(ShutdownAction::parse("Halt"), None);
    }
}
