//! Boot sequence and run loop.
//!
//! ```text
//! Application::new ─► setup(configure) ─► run / run_once
//!                        │
//!                        ├─ configure: register readers, create services
//!                        ├─ sort services by id
//!                        ├─ load properties (pushes into consumers)
//!                        └─ setup() each service in id order
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info};
use svc_bus::{BusError, Message};

use crate::config::AppConfig;
use crate::properties::LoadReport;
use crate::registry::Registry;

pub struct Application<M: Message> {
    config: AppConfig,
    registry: Registry<M>,
}

impl<M: Message> Application<M> {
    pub fn new(config: AppConfig) -> Result<Self, BusError> {
        let registry = Registry::new(config.bus.clone())?;
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry<M> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry<M> {
        &mut self.registry
    }

    /// Runs the boot sequence.
    ///
    /// A configuration document that cannot be read or parsed is logged and
    /// boot continues; consumers then simply never receive properties. The
    /// returned report is `None` in that case.
    pub fn setup<F>(&mut self, configure: F) -> Option<LoadReport>
    where
        F: FnOnce(&mut Registry<M>),
    {
        configure(&mut self.registry);
        self.registry.sort_services();

        debug!(target: "app", "load config: {}", self.config.config_path.display());
        let report = match self.registry.properties().load(&self.config.config_path) {
            Ok(report) => {
                info!(
                    target: "app",
                    "properties applied={:?} skipped={:?} failed={:?}",
                    report.applied, report.skipped, report.failed
                );
                Some(report)
            }
            Err(err) => {
                error!(target: "app", "{err}");
                None
            }
        };

        self.registry.setup_services();
        report
    }

    /// One pass of the run loop: pumps the bus once.
    pub fn run_once(&self) -> usize {
        self.registry.bus().pump()
    }

    /// Pumps the bus until `running` is cleared, then drains what is left.
    pub fn run(&self, running: &AtomicBool) {
        while running.load(Ordering::Relaxed) {
            self.run_once();
        }
        let drained = self.registry.bus().run_until_idle();
        debug!(target: "app", "stopped, drained {drained} queued entries");
    }
}
