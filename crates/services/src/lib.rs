//! # svc-services
//!
//! Core services that run on the service bus: station connectivity and a
//! broker client. Both talk to hardware or network stacks only through the
//! [`WifiDriver`] and [`BrokerClient`] seams and run on any application bus
//! whose message type embeds [`SysMessage`].
//!
//! ## Module Overview
//! - [`messages`] – `SysMessage` and well-known service ids.
//! - [`props`]    – `wifi` and `mqtt` configuration sections.
//! - [`wifi`]     – Connectivity service.
//! - [`mqtt`]     – Broker client service.
//! - [`fragment`] – Reassembly of fragmented inbound payloads.
//! - [`json`]     – JSON bridge between payloads and bus messages.

pub mod fragment;
pub mod json;
pub mod messages;
pub mod mqtt;
pub mod props;
pub mod wifi;

pub use fragment::{Reassembler, MAX_MESSAGE_LEN};
pub use json::{recv_json, send_json, SendJsonError};
pub use messages::{SysMessage, MQTT_SERVICE, WIFI_SERVICE};
pub use mqtt::{
    BrokerClient, BrokerConfig, BrokerError, BrokerEvent, BrokerListener, Credentials,
    CredentialsError, MqttService, TopicCallback,
};
pub use props::{register_readers, MqttProperties, WifiProperties};
pub use wifi::{WifiDriver, WifiEvent, WifiListener, WifiService};
