//! Host (POSIX) port of the service bus demo firmware.
//!
//! Provides what the device gets from its platform: a console logger, a
//! command line in place of compiled-in settings, and simulated radio and
//! broker drivers behind the service seams.

pub mod app;
pub mod cli;
pub mod logger;
pub mod sim;
pub mod status;

pub use app::{configure, AppMessage, MagicAction};
pub use cli::{Cli, LogLevel};
pub use logger::PortLogger;
pub use sim::{SimBroker, SimWifi};
pub use status::{StatusMessage, StatusService, STATUS_PERIOD};
