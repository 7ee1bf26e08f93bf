//! Core subsystem traffic and well-known service ids.

use svc_bus::{Message, MessageTypeId, ServiceId, Subsystem};

pub const WIFI_SERVICE: ServiceId = ServiceId::new(Subsystem::Core, 0);
pub const MQTT_SERVICE: ServiceId = ServiceId::new(Subsystem::Core, 1);

pub const WIFI_CONNECTED: MessageTypeId = MessageTypeId::new(Subsystem::Core, 0);
pub const WIFI_DISCONNECTED: MessageTypeId = MessageTypeId::new(Subsystem::Core, 1);
pub const MQTT_CONNECTED: MessageTypeId = MessageTypeId::new(Subsystem::Core, 2);
pub const MQTT_DISCONNECTED: MessageTypeId = MessageTypeId::new(Subsystem::Core, 3);
pub const MQTT_MESSAGE: MessageTypeId = MessageTypeId::new(Subsystem::Core, 4);

/// Messages raised and consumed by the core services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysMessage {
    /// Station got an address.
    WifiConnected {
        ip: String,
        gw: String,
        mask: String,
        mac: String,
    },
    WifiDisconnected {
        reason: u8,
    },
    MqttConnected,
    MqttDisconnected {
        reason: i32,
    },
    /// Outbound publication. The topic is relative to the device prefix.
    MqttMessage {
        topic: String,
        payload: String,
        qos: i32,
    },
}

impl Message for SysMessage {
    fn msg_id(&self) -> MessageTypeId {
        match self {
            Self::WifiConnected { .. } => WIFI_CONNECTED,
            Self::WifiDisconnected { .. } => WIFI_DISCONNECTED,
            Self::MqttConnected => MQTT_CONNECTED,
            Self::MqttDisconnected { .. } => MQTT_DISCONNECTED,
            Self::MqttMessage { .. } => MQTT_MESSAGE,
        }
    }
}
