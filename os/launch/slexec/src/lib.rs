//! # slexec
//!
//! Pre-boot measured launch for Intel TXT (`GETSEC[SENTER]`) and AMD
//! (`SKINIT`).
//!
//! The boot loader enters with a Multiboot magic in `EAX` and its
//! information structure in `EBX`; the entry stub hands both to
//! [`begin_launch`], which detects the CPU vendor, checks that the processor
//! and chipset can perform a measured launch, brings the CPU into the state
//! the launch instruction requires, maps the launch module through the MTRRs
//! and finally executes `SENTER` or `SKINIT`. It does not return. If any step
//! fails the [`ShutdownPolicy`] reboots, shuts down or halts the machine.
//!
//! Privileged instructions go through [`Platform`]. [`HardwarePlatform`]
//! issues them for real; `sim::SimPlatform` (feature `sim`) simulates them
//! for host-side tests. Loader parsing, the TPM, ACM verification and
//! chipset registers are supplied by the caller through [`LaunchServices`].
//!
//! ```rust,no_run
//! use slexec::{HardwarePlatform, LaunchServices};
//!
//! fn launch<S: LaunchServices>(services: &mut S, mbi: usize, magic: u32) -> ! {
//!     // entered from the loader at CPL 0 on the BSP
//!     let mut platform = unsafe { HardwarePlatform::new() };
//!     slexec::begin_launch(&mut platform, services, mbi, magic)
//! }
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod arch;
pub mod cmdline;
pub mod cpu;
pub mod error;
mod launch;
pub mod loader;
pub mod mtrr;
pub mod platform;
pub mod services;
pub mod session;
pub mod shutdown;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod skinit;
pub mod smx;
pub mod txt;

pub use arch::Architecture;
pub use error::{MtrrError, SlError};
pub use launch::begin_launch;
#[cfg(all(feature = "asm", target_arch = "x86_64"))]
pub use platform::HardwarePlatform;
pub use platform::Platform;
pub use services::LaunchServices;
pub use session::BootSession;
pub use shutdown::{ShutdownAction, ShutdownPolicy};
