//! stderr logger in the device console format: `I (1234) wifi: message`.

use std::io::Write;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

pub struct PortLogger {
    level: LevelFilter,
    started: Instant,
}

impl PortLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            started: Instant::now(),
        }
    }

    /// Installs a logger for the rest of the process.
    pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(Box::leak(Box::new(Self::new(level))))?;
        log::set_max_level(level);
        Ok(())
    }

    fn format(&self, record: &Record<'_>) -> String {
        format!(
            "{} ({}) {}: {}",
            level_letter(record.level()),
            self.started.elapsed().as_millis(),
            record.target(),
            record.args()
        )
    }
}

fn level_letter(level: Level) -> char {
    match level {
        Level::Error => 'E',
        Level::Warn => 'W',
        Level::Info => 'I',
        Level::Debug => 'D',
        Level::Trace => 'V',
    }
}

impl Log for PortLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = self.format(record);
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_carry_level_letter_and_target() {
        let logger = PortLogger::new(LevelFilter::Info);
        let line = logger.format(
            &Record::builder()
                .level(Level::Warn)
                .target("mqtt")
                .args(format_args!("pub failed"))
                .build(),
        );
        assert!(line.starts_with("W ("));
        assert!(line.ends_with(") mqtt: pub failed"));
    }

    #[test]
    fn level_filter_applies() {
        let logger = PortLogger::new(LevelFilter::Info);
        let debug = Metadata::builder().level(Level::Debug).target("bus").build();
        let error = Metadata::builder().level(Level::Error).target("bus").build();
        assert!(!logger.enabled(&debug));
        assert!(logger.enabled(&error));
    }
}
