//! # Pre-launch log sinks
//!
//! The launcher runs before any OS, firmware console or allocator is
//! available. Diagnostics therefore go straight to legacy I/O ports:
//!
//! * the **debug console** at port `0x402` (QEMU `-debugcon`; real chipsets
//!   normally do not decode it and drop the writes), and
//! * the first **16550 UART** at `0x3F8`, programmed for 115200 8N1.
//!
//! [`PortLogger`] is a `log::Log` implementation that fans each record out
//! to the enabled [`LogTargets`]. It lives in a `static`, its level and
//! sink set are atomics, so installing it needs neither allocation nor
//! `static mut`.
//!
//! ```rust,no_run
//! use launch_log::{LogTargets, init};
//! use log::{LevelFilter, info};
//!
//! init(LevelFilter::Info, LogTargets::new().with_debugcon(true)).ok();
//! info!("launcher alive");
//! ```
//!
//! With the `enabled` feature turned off every port write compiles to
//! nothing, which is what host-side unit tests rely on.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;
mod port;
mod serial;

pub use logger::{PortLogger, init, write_record};
pub use port::{DebugConSink, PortSink};
pub use serial::SerialSink;

use bitfield_struct::bitfield;

/// Which port sinks a record is written to.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct LogTargets {
    /// Debug console, port `0x402`.
    pub debugcon: bool,

    /// COM1, port `0x3F8`.
    pub serial: bool,

    #[bits(6)]
    __: u8,
}

impl LogTargets {
    /// Every sink this crate knows about.
    #[must_use]
    pub const fn all() -> Self {
        Self::new().with_debugcon(true).with_serial(true)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.debugcon() && !self.serial()
    }
}
