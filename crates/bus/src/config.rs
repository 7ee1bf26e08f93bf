//! Bus sizing and timing configuration.

use std::time::Duration;

/// Configuration for a [`MessageBus`](crate::bus::MessageBus).
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Number of entries the post queue holds before producers block.
    pub queue_capacity: usize,
    /// How long one [`pump`](crate::bus::MessageBus::pump) waits for an entry.
    pub receive_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            receive_timeout: Duration::from_millis(100),
        }
    }
}

impl BusConfig {
    pub fn builder() -> BusConfigBuilder {
        BusConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BusConfigBuilder {
    config: BusConfig,
}

impl BusConfigBuilder {
    /// Sets the post queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Sets the bounded wait used by the dispatch loop.
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.config.receive_timeout = timeout;
        self
    }

    pub fn build(self) -> BusConfig {
        self.config
    }
}
