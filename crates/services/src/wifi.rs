//! Station connectivity service.
//!
//! The service owns no radio. It hands the configured credentials to a
//! [`WifiDriver`] and turns the driver's events into [`SysMessage`]s on the
//! bus. Events may arrive on any driver thread; they only ever reach the bus
//! through the service's [`Poster`].

use std::sync::{Arc, Weak};

use log::info;
use svc_bus::{Embeds, Message, Poster, ServiceId};
use svc_registry::{PropertiesConsumer, PropertiesObject, Service, ServiceContext};

use crate::messages::{SysMessage, WIFI_SERVICE};
use crate::props::WifiProperties;

/// Events reported by a station driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiEvent {
    /// Associated with the access point, no address yet.
    Associated,
    GotIp {
        ip: String,
        gw: String,
        mask: String,
        mac: String,
    },
    Disconnected {
        reason: u8,
    },
}

pub type WifiListener = Box<dyn Fn(WifiEvent) + Send + Sync>;

/// Station driver seam.
pub trait WifiDriver: Send + Sync {
    /// Installs the event sink. Replaces any earlier one.
    fn on_event(&self, listener: WifiListener);

    fn set_auto_reconnect(&self, enabled: bool);

    /// Starts associating with `ssid`. Progress is reported via the event sink.
    fn begin(&self, ssid: &str, password: &str);
}

pub struct WifiService<M: Message> {
    driver: Arc<dyn WifiDriver>,
    poster: Poster<M>,
    this: Weak<Self>,
}

impl<M> WifiService<M>
where
    M: Message + Embeds<SysMessage>,
{
    pub fn new(ctx: &ServiceContext<'_, M, Self>, driver: Arc<dyn WifiDriver>) -> Self {
        ctx.consume_properties();
        Self {
            driver,
            poster: ctx.poster(),
            this: ctx.this(),
        }
    }

    /// Translates one driver event. Safe to call from the driver's thread.
    pub fn handle_event(&self, event: WifiEvent) {
        match event {
            WifiEvent::Associated => {}
            WifiEvent::GotIp { ip, gw, mask, mac } => {
                info!(target: "wifi", "connected");
                info!(target: "wifi", "IP address: {ip}/{mask}");
                info!(target: "wifi", "GW address: {gw}");
                info!(target: "wifi", "MAC address: {mac}");
                self.poster
                    .post(M::from(SysMessage::WifiConnected { ip, gw, mask, mac }));
            }
            WifiEvent::Disconnected { reason } => {
                info!(target: "wifi", "lost connection, reason {reason}");
                self.poster
                    .post(M::from(SysMessage::WifiDisconnected { reason }));
            }
        }
    }

    fn start(&self, props: &WifiProperties) {
        info!(target: "wifi", "SSID: {}", props.ssid);
        let this = self.this.clone();
        self.driver.on_event(Box::new(move |event| {
            if let Some(service) = this.upgrade() {
                service.handle_event(event);
            }
        }));
        self.driver.set_auto_reconnect(true);
        self.driver.begin(&props.ssid, &props.password);
    }
}

impl<M> Service<M> for WifiService<M>
where
    M: Message + Embeds<SysMessage>,
{
    fn service_id(&self) -> ServiceId {
        WIFI_SERVICE
    }
}

impl<M> PropertiesConsumer for WifiService<M>
where
    M: Message + Embeds<SysMessage>,
{
    fn apply_properties(&self, props: &PropertiesObject) {
        if let Some(props) = props.get::<WifiProperties>() {
            self.start(props);
        }
    }
}
