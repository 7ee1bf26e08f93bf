//! Simulated radio and broker for running the services on a host.
//!
//! Both drivers report events from their own threads, like the real stacks
//! do, so the services see the same threading they get on the device.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info};
use parking_lot::Mutex;
use svc_services::{
    BrokerClient, BrokerConfig, BrokerError, BrokerEvent, BrokerListener, WifiDriver, WifiEvent,
    WifiListener,
};

fn spawn_after<F>(name: &str, delay: Duration, work: F)
where
    F: FnOnce() + Send + 'static,
{
    let spawned = thread::Builder::new().name(name.to_owned()).spawn(move || {
        thread::sleep(delay);
        work();
    });
    if let Err(err) = spawned {
        error!(target: "app", "cannot spawn {name}: {err}");
    }
}

/// Station that associates after `link_delay` and hands out a fixed address.
pub struct SimWifi {
    link_delay: Duration,
    listener: Arc<Mutex<Option<Arc<WifiListener>>>>,
    auto_reconnect: AtomicBool,
}

impl SimWifi {
    pub fn new(link_delay: Duration) -> Self {
        Self {
            link_delay,
            listener: Arc::new(Mutex::new(None)),
            auto_reconnect: AtomicBool::new(false),
        }
    }

    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect.load(Ordering::Relaxed)
    }

    /// Reports a dropped link, as an access point going away would.
    pub fn drop_link(&self, reason: u8) {
        emit_wifi(&self.listener, WifiEvent::Disconnected { reason });
    }
}

fn emit_wifi(listener: &Mutex<Option<Arc<WifiListener>>>, event: WifiEvent) {
    let listener = listener.lock().clone();
    if let Some(listener) = listener {
        listener(event);
    }
}

impl WifiDriver for SimWifi {
    fn on_event(&self, listener: WifiListener) {
        *self.listener.lock() = Some(Arc::new(listener));
    }

    fn set_auto_reconnect(&self, enabled: bool) {
        self.auto_reconnect.store(enabled, Ordering::Relaxed);
    }

    fn begin(&self, ssid: &str, _password: &str) {
        info!(target: "wifi", "sim: joining {ssid}");
        let listener = Arc::clone(&self.listener);
        spawn_after("sim-wifi", self.link_delay, move || {
            emit_wifi(&listener, WifiEvent::Associated);
            emit_wifi(
                &listener,
                WifiEvent::GotIp {
                    ip: "10.0.0.42".into(),
                    gw: "10.0.0.1".into(),
                    mask: "255.255.255.0".into(),
                    mac: "02:00:00:00:00:2a".into(),
                },
            );
        });
    }
}

#[derive(Default)]
struct BrokerState {
    listener: Mutex<Option<Arc<BrokerListener>>>,
    subscriptions: Mutex<Vec<String>>,
    published: Mutex<Vec<(String, String)>>,
    connected: AtomicBool,
    next_msg_id: AtomicI32,
}

impl BrokerState {
    fn emit(&self, event: BrokerEvent) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(event);
        }
    }

    fn msg_id(&self) -> i32 {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Broker that accepts every connection after `connect_delay` and records
/// what the device subscribes to and publishes.
pub struct SimBroker {
    connect_delay: Duration,
    state: Arc<BrokerState>,
}

impl SimBroker {
    pub fn new(connect_delay: Duration) -> Self {
        Self {
            connect_delay,
            state: Arc::new(BrokerState::default()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Relaxed)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state.subscriptions.lock().clone()
    }

    /// `(topic, payload)` of every publication so far.
    pub fn published(&self) -> Vec<(String, String)> {
        self.state.published.lock().clone()
    }

    /// Delivers `payload` to every subscription ending in `suffix`, split
    /// into fragments of at most `chunk` bytes.
    pub fn inject(&self, suffix: &str, payload: &[u8], chunk: usize) -> usize {
        let topics: Vec<String> = self
            .subscriptions()
            .into_iter()
            .filter(|topic| topic.ends_with(suffix))
            .collect();
        let chunk = chunk.max(1);
        for topic in &topics {
            let mut offset = 0;
            for data in payload.chunks(chunk) {
                self.state.emit(BrokerEvent::Data {
                    topic: topic.clone(),
                    data: data.to_vec(),
                    offset,
                    total: payload.len(),
                });
                offset += data.len();
            }
        }
        topics.len()
    }
}

impl BrokerClient for SimBroker {
    fn connect(&self, config: &BrokerConfig, listener: BrokerListener) -> Result<(), BrokerError> {
        info!(target: "mqtt", "sim: connecting to {}", config.uri);
        *self.state.listener.lock() = Some(Arc::new(listener));
        let state = Arc::clone(&self.state);
        spawn_after("sim-broker", self.connect_delay, move || {
            state.connected.store(true, Ordering::Relaxed);
            state.emit(BrokerEvent::Connected);
        });
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: i32) -> Result<i32, BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        let mut subscriptions = self.state.subscriptions.lock();
        if !subscriptions.iter().any(|known| known == topic) {
            subscriptions.push(topic.to_owned());
        }
        debug!(target: "mqtt", "sim: subscribed {topic} qos {qos}");
        Ok(self.state.msg_id())
    }

    fn publish(&self, topic: &str, _qos: i32, payload: &[u8]) -> Result<i32, BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        let payload = String::from_utf8_lossy(payload).into_owned();
        info!(target: "mqtt", "sim: {topic} <- {}", payload.replace('\n', ""));
        self.state.published.lock().push((topic.to_owned(), payload));
        Ok(self.state.msg_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn inject_splits_payload_into_ordered_fragments() {
        let broker = SimBroker::new(Duration::ZERO);
        broker.state.connected.store(true, Ordering::Relaxed);
        broker.subscribe("/p/d/magic-action", 0).unwrap();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: BrokerListener = Box::new(move |event| {
            if let BrokerEvent::Data { offset, total, data, .. } = event {
                sink.lock().unwrap().push((offset, total, data.len()));
            }
        });
        *broker.state.listener.lock() = Some(Arc::new(listener));

        assert_eq!(broker.inject("/magic-action", b"0123456789", 4), 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(0, 10, 4), (4, 10, 4), (8, 10, 2)]
        );
        assert_eq!(broker.inject("/other", b"x", 4), 0);
    }

    #[test]
    fn requests_fail_until_connected() {
        let broker = SimBroker::new(Duration::ZERO);
        assert_eq!(broker.subscribe("/t", 0), Err(BrokerError::NotConnected));
        assert_eq!(broker.publish("/t", 0, b"x"), Err(BrokerError::NotConnected));
    }
}
