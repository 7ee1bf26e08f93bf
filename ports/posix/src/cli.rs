//! Command line of the host build.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use svc_bus::BusConfig;
use svc_registry::{AppConfig, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(author, version, about = "Host build of the service bus demo firmware")]
pub struct Cli {
    /// Properties document loaded at boot.
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH, value_name = "PATH")]
    pub config: PathBuf,

    /// Capacity of the bus post queue.
    #[arg(long = "queue-capacity", default_value_t = 10, value_name = "N")]
    pub queue_capacity: usize,

    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Seconds between simulated magic actions; 0 disables them.
    #[arg(long = "magic-every", default_value_t = 5, value_name = "SECS")]
    pub magic_every: u64,

    /// Stop after this many seconds instead of waiting for ctrl-c.
    #[arg(long = "run-for", value_name = "SECS")]
    pub run_for: Option<u64>,
}

impl Cli {
    pub fn app_config(&self) -> AppConfig {
        AppConfig::builder()
            .config_path(&self.config)
            .bus(BusConfig::builder().queue_capacity(self.queue_capacity).build())
            .build()
    }

    pub fn magic_interval(&self) -> Option<Duration> {
        (self.magic_every > 0).then(|| Duration::from_secs(self.magic_every))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}
