use crate::LogTargets;
use crate::port::DebugConSink;
use crate::serial::SerialSink;
use core::fmt::{self, Write};
use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Logger that writes each record to the enabled legacy I/O port sinks.
pub struct PortLogger {
    max_level: AtomicUsize,
    targets: AtomicU8,
}

static LOGGER: PortLogger = PortLogger::new(LevelFilter::Trace, LogTargets::all());

impl PortLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter, targets: LogTargets) -> Self {
        Self {
            max_level: AtomicUsize::new(max_level as usize),
            targets: AtomicU8::new(targets.into_bits()),
        }
    }

    pub fn set_max_level(&self, level: LevelFilter) {
        self.max_level.store(level as usize, Ordering::Relaxed);
    }

    #[must_use]
    pub fn max_level(&self) -> LevelFilter {
        level_from_usize(self.max_level.load(Ordering::Relaxed))
    }

    pub fn set_targets(&self, targets: LogTargets) {
        self.targets.store(targets.into_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn targets(&self) -> LogTargets {
        LogTargets::from_bits(self.targets.load(Ordering::Relaxed))
    }
}

const fn level_from_usize(v: usize) -> LevelFilter {
    match v {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the port logger. Call this once during early init.
///
/// A second call only updates level and targets on the already installed
/// logger and returns the `SetLoggerError` from `log`.
///
/// # Errors
/// Another logger (or this one) has already been registered with `log`.
pub fn init(level: LevelFilter, targets: LogTargets) -> Result<(), SetLoggerError> {
    LOGGER.set_max_level(level);
    LOGGER.set_targets(targets);
    if targets.serial() {
        SerialSink::com1().init();
    }

    log::set_max_level(level);
    log::set_logger(&LOGGER)
}

/// Format one record as `"[LEVEL] target: message\n"`.
///
/// # Errors
/// Whatever the sink returns.
pub fn write_record<W: Write>(out: &mut W, record: &Record) -> fmt::Result {
    writeln!(
        out,
        "[{}] {}: {}",
        record.level(),
        record.target(),
        record.args()
    )
}

impl Log for PortLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let targets = self.targets();
        // Sinks are best effort, there is nowhere to report a failed write.
        if targets.debugcon() {
            let _ = write_record(&mut DebugConSink, record);
        }
        if targets.serial() {
            let _ = write_record(&mut SerialSink::com1(), record);
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn record_format() {
        let mut out = String::new();
        write_record(
            &mut out,
            &Record::builder()
                .level(Level::Warn)
                .target("slexec::mtrr")
                .args(format_args!("{} ranges", 3))
                .build(),
        )
        .unwrap();
        assert_eq!(out, "[WARN] slexec::mtrr: 3 ranges\n");
    }

    #[test]
    fn level_filter_roundtrip() {
        for level in LevelFilter::iter() {
            assert_eq!(level_from_usize(level as usize), level);
        }
    }

    #[test]
    fn disabled_levels_are_filtered() {
        let logger = PortLogger::new(LevelFilter::Warn, LogTargets::new());
        assert!(logger.enabled(&Metadata::builder().level(Level::Error).build()));
        assert!(!logger.enabled(&Metadata::builder().level(Level::Info).build()));

        logger.set_max_level(LevelFilter::Off);
        assert!(!logger.enabled(&Metadata::builder().level(Level::Error).build()));
    }

    #[test]
    fn targets_are_stored() {
        let logger = PortLogger::new(LevelFilter::Info, LogTargets::all());
        logger.set_targets(LogTargets::new().with_serial(true));
        assert!(logger.targets().serial());
        assert!(!logger.targets().debugcon());
    }
}
