//! # svc-bus
//!
//! The inter-service communication layer of the service framework: a single
//! process-wide queue of owned messages, synchronous fan-out, an
//! interrupt-safe enqueue path and timer-driven delayed delivery.
//!
//! ## Module Overview
//! - [`id`]         – Subsystem-scoped message, service and properties ids.
//! - [`message`]    – The [`Message`] trait and subsystem nesting.
//! - [`subscriber`] – Subscriber trait, closure adapter and handler tables.
//! - [`queue`]      – Bounded blocking FIFO shared across contexts.
//! - [`timer`]      – Timer thread, scoped timers and detached entries.
//! - [`bus`]        – The [`MessageBus`] and its enqueue-only [`Poster`].
//! - [`config`]     – Queue sizing and dispatch timing.

pub mod bus;
pub mod config;
pub mod id;
pub mod message;
pub mod queue;
pub mod subscriber;
pub mod timer;

pub use bus::{BusError, BusStatsSnapshot, MessageBus, Poster, ScheduleId};
pub use config::{BusConfig, BusConfigBuilder};
pub use id::{MessageTypeId, PropertyTypeId, ServiceId, Subsystem};
pub use message::{Embeds, Message, TimerCallback};
pub use queue::MessageQueue;
pub use subscriber::{FnSubscriber, Handlers, Subscriber, SubscriberRef};
pub use timer::{Timer, TimerError, TimerHandle, TimerKey, TimerService};

#[cfg(test)]
mod tests;
