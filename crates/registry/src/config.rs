//! Application configuration.

use std::path::PathBuf;

use svc_bus::BusConfig;

/// Well-known location of the configuration document on the device.
pub const DEFAULT_CONFIG_PATH: &str = "/config.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path of the properties document loaded at boot.
    pub config_path: PathBuf,
    pub bus: BusConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            bus: BusConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_path = path.into();
        self
    }

    pub fn bus(mut self, bus: BusConfig) -> Self {
        self.config.bus = bus;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
