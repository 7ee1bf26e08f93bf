//! # svc-registry
//!
//! Bootstraps and wires services: the registry that owns them, the loader
//! that feeds them configuration, and the boot sequence that ties both to
//! the message bus.
//!
//! ## Module Overview
//! - [`properties`] – Configuration document decoding and fan-out.
//! - [`registry`]   – Service ownership, lookup and setup order.
//! - [`app`]        – Boot sequence and run loop.
//! - [`config`]     – Application configuration.

pub mod app;
pub mod config;
pub mod properties;
pub mod registry;

pub use app::Application;
pub use config::{AppConfig, AppConfigBuilder, DEFAULT_CONFIG_PATH};
pub use properties::{
    json_reader, ConsumerRef, LoadReport, Properties, PropertiesConsumer, PropertiesError,
    PropertiesLoader, PropertiesObject, PropertiesReader, TypedConsumer,
};
pub use registry::{Registry, Service, ServiceContext};

#[cfg(test)]
mod tests;
