//! Broker client service.
//!
//! Bridges a [`BrokerClient`] and the bus:
//!
//! - `MqttProperties` → [`Credentials`] and the `/{product}/{device}` topic prefix
//! - `WifiConnected` on the bus → connect
//! - `MqttMessage` on the bus → publish under the prefix
//! - client events → `MqttConnected` / `MqttDisconnected` on the bus, and
//!   reassembled payloads handed to the callback registered for the topic
//!
//! Topics passed to [`MqttService::subscribe`] and [`MqttService::publish`]
//! are relative; the prefix is applied when the broker is addressed, so
//! callbacks may be registered before properties are loaded.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use svc_bus::{Embeds, Message, Poster, ServiceId, Subscriber};
use svc_registry::{PropertiesConsumer, PropertiesObject, Registry, Service, ServiceContext};
use thiserror::Error;

use crate::fragment::Reassembler;
use crate::messages::{SysMessage, MQTT_SERVICE};
use crate::props::MqttProperties;

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const RECONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("cannot read {what} from {path}: {source}")]
    Io {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("transport error: tls 0x{tls:x}, errno {errno}")]
    Transport { tls: i32, errno: i32 },
    #[error("connection refused: 0x{0:x}")]
    ConnectionRefused(i32),
    #[error("not connected")]
    NotConnected,
    #[error("broker error type 0x{0:x}")]
    Other(i32),
}

impl BrokerError {
    /// Code carried by the `MqttDisconnected` message raised for this error.
    pub fn reason(&self) -> i32 {
        match self {
            Self::Transport { errno, .. } => *errno,
            Self::ConnectionRefused(code) | Self::Other(code) => *code,
            Self::NotConnected => -1,
        }
    }
}

/// Device identity and TLS material for one broker account.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub product: String,
    pub device_name: String,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub uri: String,
    pub ca_cert: String,
    pub client_cert: String,
    pub client_key: String,
}

impl Credentials {
    /// Reads the PEM files named by `props`. An empty file name yields an
    /// empty PEM, which plain TCP brokers accept.
    pub fn load(props: &MqttProperties) -> Result<Self, CredentialsError> {
        Ok(Self {
            product: props.product_name.clone(),
            device_name: props.device_name.clone(),
            client_id: props.device_name.clone(),
            username: props.username.clone(),
            password: props.password.clone(),
            uri: props.uri.clone(),
            ca_cert: read_pem("CA certificate", &props.ca_cert_file)?,
            client_cert: read_pem("client certificate", &props.client_cert_file)?,
            client_key: read_pem("client key", &props.client_key_file)?,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("uri", &self.uri)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

fn read_pem(what: &'static str, path: &str) -> Result<String, CredentialsError> {
    if path.is_empty() {
        return Ok(String::new());
    }
    fs::read_to_string(path).map_err(|source| CredentialsError::Io {
        what,
        path: PathBuf::from(path),
        source,
    })
}

/// Connection parameters handed to a [`BrokerClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub uri: String,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub keep_alive: Duration,
    pub auto_reconnect: bool,
    pub reconnect_timeout: Duration,
    pub ca_cert: String,
    pub client_cert: String,
    pub client_key: String,
    pub skip_cert_common_name_check: bool,
}

impl From<&Credentials> for BrokerConfig {
    fn from(credentials: &Credentials) -> Self {
        Self {
            uri: credentials.uri.clone(),
            client_id: credentials.client_id.clone(),
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            keep_alive: KEEP_ALIVE,
            auto_reconnect: true,
            reconnect_timeout: RECONNECT_TIMEOUT,
            ca_cert: credentials.ca_cert.clone(),
            client_cert: credentials.client_cert.clone(),
            client_key: credentials.client_key.clone(),
            skip_cert_common_name_check: true,
        }
    }
}

/// Events reported by a broker client, possibly from its own thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Connected,
    Disconnected {
        reason: i32,
    },
    Subscribed {
        msg_id: i32,
        qos: i32,
    },
    Published {
        msg_id: i32,
    },
    /// One fragment of an inbound publication.
    Data {
        topic: String,
        data: Vec<u8>,
        offset: usize,
        total: usize,
    },
    Error(BrokerError),
}

pub type BrokerListener = Box<dyn Fn(BrokerEvent) + Send + Sync>;

/// Broker client seam.
///
/// Events go to the listener from the client's own thread, never from inside
/// one of these calls: the service makes them while dispatching bus messages.
pub trait BrokerClient: Send + Sync {
    /// Starts connecting. Progress and inbound data go to `listener`.
    fn connect(&self, config: &BrokerConfig, listener: BrokerListener) -> Result<(), BrokerError>;

    /// Returns the message id of the subscribe request.
    fn subscribe(&self, topic: &str, qos: i32) -> Result<i32, BrokerError>;

    /// Returns the message id of the publication.
    fn publish(&self, topic: &str, qos: i32, payload: &[u8]) -> Result<i32, BrokerError>;
}

/// Receives the full topic and the reassembled payload.
pub type TopicCallback = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

struct TopicEntry {
    qos: i32,
    callback: TopicCallback,
}

#[derive(Default)]
struct MqttState {
    credentials: Option<Credentials>,
    prefix: String,
    /// Keyed by relative topic.
    topics: BTreeMap<String, TopicEntry>,
    fragments: Reassembler,
    connected: bool,
}

pub struct MqttService<M: Message> {
    client: Arc<dyn BrokerClient>,
    poster: Poster<M>,
    this: Weak<Self>,
    state: Mutex<MqttState>,
}

impl<M> MqttService<M>
where
    M: Message + Embeds<SysMessage>,
{
    pub fn new(ctx: &ServiceContext<'_, M, Self>, client: Arc<dyn BrokerClient>) -> Self {
        ctx.consume_properties();
        Self {
            client,
            poster: ctx.poster(),
            this: ctx.this(),
            state: Mutex::new(MqttState::default()),
        }
    }

    /// Registers `callback` for `topic` (relative to the device prefix).
    /// Subscribes right away when connected, otherwise on the next connect.
    pub fn subscribe<F>(&self, topic: &str, qos: i32, callback: F)
    where
        F: Fn(&str, &[u8]) + Send + Sync + 'static,
    {
        let full = {
            let mut state = self.state.lock();
            state.topics.insert(
                topic.to_owned(),
                TopicEntry {
                    qos,
                    callback: Arc::new(callback),
                },
            );
            state.connected.then(|| format!("{}{topic}", state.prefix))
        };
        if let Some(full) = full {
            self.subscribe_remote(&full, qos);
        }
    }

    /// Publishes `payload` under the device prefix.
    pub fn publish(&self, topic: &str, qos: i32, payload: &[u8]) {
        let full = format!("{}{topic}", self.state.lock().prefix);
        debug!(target: "mqtt", "pub: topic: {full}, payload: {}", payload.len());
        if let Err(err) = self.client.publish(&full, qos, payload) {
            warn!(target: "mqtt", "pub failed: {full}: {err}");
        }
    }

    pub fn topic_prefix(&self) -> String {
        self.state.lock().prefix.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Translates one client event. Safe to call from the client's thread.
    pub fn handle_event(&self, event: BrokerEvent) {
        match event {
            BrokerEvent::Connected => self.on_connect(),
            BrokerEvent::Disconnected { reason } => {
                info!(target: "mqtt", "disconnected, reason {reason}");
                self.on_disconnect(reason);
            }
            BrokerEvent::Subscribed { msg_id, qos } => {
                debug!(target: "mqtt", "sub topic: msg-id: {msg_id}, qos: {qos}");
            }
            BrokerEvent::Published { msg_id } => {
                debug!(target: "mqtt", "pub topic: msg-id: {msg_id}");
            }
            BrokerEvent::Data {
                topic,
                data,
                offset,
                total,
            } => self.on_data(&topic, &data, offset, total),
            BrokerEvent::Error(err) => {
                warn!(target: "mqtt", "{err}");
                self.on_disconnect(err.reason());
            }
        }
    }

    fn connect(&self) {
        let config = {
            let state = self.state.lock();
            match &state.credentials {
                Some(credentials) => BrokerConfig::from(credentials),
                None => {
                    warn!(target: "mqtt", "no credentials, not connecting");
                    return;
                }
            }
        };
        info!(target: "mqtt", "uri: {}", config.uri);
        info!(target: "mqtt", "username: {}", config.username);
        info!(target: "mqtt", "client-id: {}", config.client_id);

        let this = self.this.clone();
        let listener: BrokerListener = Box::new(move |event| {
            if let Some(service) = this.upgrade() {
                service.handle_event(event);
            }
        });
        if let Err(err) = self.client.connect(&config, listener) {
            error!(target: "mqtt", "connect failed: {err}");
        }
    }

    fn on_connect(&self) {
        let topics: Vec<(String, i32)> = {
            let mut state = self.state.lock();
            state.connected = true;
            state
                .topics
                .iter()
                .map(|(topic, entry)| (format!("{}{topic}", state.prefix), entry.qos))
                .collect()
        };
        self.poster.post(M::from(SysMessage::MqttConnected));
        for (topic, qos) in topics {
            self.subscribe_remote(&topic, qos);
        }
    }

    fn on_disconnect(&self, reason: i32) {
        {
            let mut state = self.state.lock();
            state.connected = false;
            state.fragments.clear();
        }
        self.poster
            .post(M::from(SysMessage::MqttDisconnected { reason }));
    }

    fn subscribe_remote(&self, topic: &str, qos: i32) {
        match self.client.subscribe(topic, qos) {
            Ok(_) => debug!(target: "mqtt", "sub topic: {topic}"),
            Err(err) => error!(target: "mqtt", "sub failed: {topic}: {err}"),
        }
    }

    fn on_data(&self, topic: &str, data: &[u8], offset: usize, total: usize) {
        let (callback, payload) = {
            let mut state = self.state.lock();
            let Some(payload) = state.fragments.push(topic, data, offset, total) else {
                return;
            };
            let payload = payload.into_owned();
            let callback = topic
                .strip_prefix(state.prefix.as_str())
                .and_then(|relative| state.topics.get(relative))
                .map(|entry| Arc::clone(&entry.callback));
            (callback, payload)
        };

        match callback {
            Some(callback) => callback(topic, &payload),
            None => error!(target: "mqtt", "no handler for topic: {topic}"),
        }
    }

    fn configure(&self, props: &MqttProperties) {
        let credentials = match Credentials::load(props) {
            Ok(credentials) => Some(credentials),
            Err(err) => {
                error!(target: "mqtt", "{err}");
                None
            }
        };
        let mut state = self.state.lock();
        state.prefix = format!("/{}/{}", props.product_name, props.device_name);
        state.credentials = credentials;
    }
}

impl<M> Service<M> for MqttService<M>
where
    M: Message + Embeds<SysMessage>,
{
    fn service_id(&self) -> ServiceId {
        MQTT_SERVICE
    }

    fn setup(&self, registry: &Registry<M>) {
        registry.bus().subscribe(Arc::new(self.this.clone()));
    }
}

impl<M> Subscriber<M> for MqttService<M>
where
    M: Message + Embeds<SysMessage>,
{
    fn on_message(&self, msg: &M) {
        match Embeds::<SysMessage>::peek(msg) {
            Some(SysMessage::WifiConnected { .. }) => self.connect(),
            Some(SysMessage::MqttMessage {
                topic,
                payload,
                qos,
            }) => self.publish(topic, *qos, payload.as_bytes()),
            _ => {}
        }
    }
}

impl<M> PropertiesConsumer for MqttService<M>
where
    M: Message + Embeds<SysMessage>,
{
    fn apply_properties(&self, props: &PropertiesObject) {
        if let Some(props) = props.get::<MqttProperties>() {
            self.configure(props);
        }
    }
}
