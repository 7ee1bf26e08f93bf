//! Configuration sections understood by the core services.

use serde::Deserialize;
use svc_bus::{PropertyTypeId, Subsystem};
use svc_registry::{Properties, PropertiesLoader};

pub const WIFI_SECTION: &str = "wifi";
pub const MQTT_SECTION: &str = "mqtt";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WifiProperties {
    pub ssid: String,
    pub password: String,
}

impl Properties for WifiProperties {
    const ID: PropertyTypeId = PropertyTypeId::new(Subsystem::Core, 0);
}

/// Broker account and device identity. Certificate fields name PEM files on
/// the local file system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MqttProperties {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub ca_cert_file: String,
    pub client_cert_file: String,
    pub client_key_file: String,
    pub device_name: String,
    pub product_name: String,
}

impl Properties for MqttProperties {
    const ID: PropertyTypeId = PropertyTypeId::new(Subsystem::Core, 1);
}

/// Registers the `wifi` and `mqtt` section readers.
pub fn register_readers(loader: &PropertiesLoader) {
    loader.add_json_reader::<WifiProperties>(WIFI_SECTION);
    loader.add_json_reader::<MqttProperties>(MQTT_SECTION);
}
