//! Demo application: connectivity, broker client, a remote "magic action"
//! command and the periodic status report published as its reply.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use serde::Deserialize;
use svc_bus::{Embeds, Message, MessageTypeId, Subsystem};
use svc_registry::Registry;
use svc_services::{
    recv_json, register_readers, send_json, BrokerClient, MqttService, SysMessage, WifiDriver,
    WifiService, MQTT_SERVICE,
};

use crate::status::{StatusMessage, StatusService};

pub const MAGIC_ACTION: MessageTypeId = MessageTypeId::new(Subsystem::User, 0);
pub const STATUS: MessageTypeId = MessageTypeId::new(Subsystem::User, 1);

pub const MAGIC_ACTION_TOPIC: &str = "/magic-action";
pub const MAGIC_ACTION_REPLY_TOPIC: &str = "/magic-action-reply";

/// Remote command received on [`MAGIC_ACTION_TOPIC`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MagicAction {
    pub action_id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMessage {
    Sys(SysMessage),
    Status(StatusMessage),
    Magic(MagicAction),
}

impl Message for AppMessage {
    fn msg_id(&self) -> MessageTypeId {
        match self {
            Self::Sys(msg) => msg.msg_id(),
            Self::Status(_) => STATUS,
            Self::Magic(_) => MAGIC_ACTION,
        }
    }
}

impl From<SysMessage> for AppMessage {
    fn from(msg: SysMessage) -> Self {
        Self::Sys(msg)
    }
}

impl From<StatusMessage> for AppMessage {
    fn from(msg: StatusMessage) -> Self {
        Self::Status(msg)
    }
}

impl From<MagicAction> for AppMessage {
    fn from(msg: MagicAction) -> Self {
        Self::Magic(msg)
    }
}

impl Embeds<SysMessage> for AppMessage {
    fn peek(&self) -> Option<&SysMessage> {
        match self {
            Self::Sys(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Registers readers, creates the services and wires the topic handlers.
/// Passed to [`Application::setup`](svc_registry::Application::setup).
pub fn configure(
    registry: &mut Registry<AppMessage>,
    wifi: Arc<dyn WifiDriver>,
    broker: Arc<dyn BrokerClient>,
    status_period: Duration,
) {
    register_readers(registry.properties());

    registry.bus().subscribe_fn(|msg: &AppMessage| {
        if let AppMessage::Magic(action) = msg {
            info!(target: "app", "action: {}", action.action_id);
        }
    });

    registry.create::<WifiService<AppMessage>, _>(|ctx| WifiService::new(ctx, wifi));

    registry.create::<MqttService<AppMessage>, _>(|ctx| MqttService::new(ctx, broker));
    if let Some(mqtt) = registry.service::<MqttService<AppMessage>>(MQTT_SERVICE) {
        let poster = registry.bus().poster();
        // Topic callbacks run on the broker thread, so a blocking post is fine.
        mqtt.subscribe(MAGIC_ACTION_TOPIC, 0, move |topic, payload| {
            if let Err(err) = recv_json::<AppMessage, MagicAction>(&poster, payload) {
                warn!(target: "app", "{topic}: {err}");
            }
        });
    }

    // Runs on the dispatch thread: send_json drops the reply on a full queue
    // instead of waiting.
    let poster = registry.bus().poster();
    registry.bus().subscribe_fn(move |msg: &AppMessage| {
        if let AppMessage::Status(status) = msg {
            if let Err(err) = send_json(&poster, MAGIC_ACTION_REPLY_TOPIC, status) {
                warn!(target: "app", "status reply: {err}");
            }
        }
    });

    registry.create::<StatusService<AppMessage>, _>(|ctx| StatusService::new(ctx, status_period));
}
