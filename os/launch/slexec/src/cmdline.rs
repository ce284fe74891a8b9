//! # Command line
//!
//! The loader-supplied command line is copied once into a fixed buffer and
//! parsed into a [`LaunchConfig`]. Options are whitespace separated
//! `key[=value]` tokens:
//!
//! | Key               | Values                                          | Default            |
//! |-------------------|-------------------------------------------------|--------------------|
//! | `shutdown-action` | `reboot`, `shutdown`, `halt`                    | `reboot`           |
//! | `ignore-prev-err` | bare, `true`, `false`                           | `false`            |
//! | `loglvl`          | `none`, `err`, `warn`, `info`, `detail`, `all`  | `all`              |
//! | `logging`         | comma list of `serial`, `debugcon`, `none`      | `serial,debugcon`  |
//!
//! Unknown keys and bad values are reported and otherwise ignored.

use crate::shutdown::ShutdownAction;
use launch_log::LogTargets;
use log::{LevelFilter, warn};

/// Capacity of the command line copy, including the terminating NUL.
pub const CMDLINE_SIZE: usize = 512;

/// Fixed-capacity, NUL-terminated copy of the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdlineBuffer<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> Default for CmdlineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CmdlineBuffer<N> {
    /// An empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        const { assert!(N > 0, "no room for the terminating NUL") };
        Self { bytes: [0; N], len: 0 }
    }

    /// Copy `src` up to its first NUL, clipped to `N - 1` bytes.
    #[must_use]
    pub fn copy_from(src: Option<&[u8]>) -> Self {
        let mut buf = Self::new();
        if let Some(src) = src {
            let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
            let len = end.min(N - 1);
            buf.bytes[..len].copy_from_slice(&src[..len]);
            buf.len = len;
        }
        buf
    }

    /// Copied bytes without the terminator.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The whole buffer; `raw()[len()]` is always NUL.
    #[must_use]
    pub const fn raw(&self) -> &[u8; N] {
        &self.bytes
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The command line as text, cut at the first invalid UTF-8 sequence.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match core::str::from_utf8(self.as_bytes()) {
            Ok(s) => s,
            Err(e) => core::str::from_utf8(&self.bytes[..e.valid_up_to()]).unwrap_or_default(),
        }
    }
}

/// Options taken from the command line.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub shutdown_action: ShutdownAction,
    pub ignore_prev_err: bool,
    pub log_level: LevelFilter,
    pub log_targets: LogTargets,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            shutdown_action: ShutdownAction::Reboot,
            ignore_prev_err: false,
            log_level: LevelFilter::Trace,
            log_targets: LogTargets::all(),
        }
    }
}

impl LaunchConfig {
    /// Parse a command line. Never fails; see the module docs.
    #[must_use]
    pub fn parse(cmdline: &str) -> Self {
        let mut config = Self::default();
        for token in cmdline.split_ascii_whitespace() {
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (token, None),
            };
            match key {
                "shutdown-action" => match value.and_then(ShutdownAction::parse) {
                    Some(action) => config.shutdown_action = action,
                    None => warn!("bad shutdown-action: {token}"),
                },
                "ignore-prev-err" => match value {
                    None | Some("true") => config.ignore_prev_err = true,
                    Some("false") => config.ignore_prev_err = false,
                    Some(_) => warn!("bad ignore-prev-err: {token}"),
                },
                "loglvl" => match value.and_then(parse_log_level) {
                    Some(level) => config.log_level = level,
                    None => warn!("bad loglvl: {token}"),
                },
                "logging" => match value.and_then(parse_log_targets) {
                    Some(targets) => config.log_targets = targets,
                    None => warn!("bad logging: {token}"),
                },
                _ => warn!("unknown option: {token}"),
            }
        }
        config
    }
}

fn parse_log_level(s: &str) -> Option<LevelFilter> {
    Some(match s {
        "none" => LevelFilter::Off,
        "err" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "detail" => LevelFilter::Debug,
        "all" => LevelFilter::Trace,
        _ => return None,
    })
}

fn parse_log_targets(s: &str) -> Option<LogTargets> {
    let mut targets = LogTargets::new();
    for name in s.split(',') {
        targets = match name {
            "serial" => targets.with_serial(true),
            "debugcon" => targets.with_debugcon(true),
            "none" => LogTargets::new(),
            _ => return None,
        };
    }
    Some(targets)
}
