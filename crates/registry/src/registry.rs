//! Service registry.
//!
//! The registry is the context object every service is built against. It
//! owns the services, the one [`MessageBus`] and the one
//! [`PropertiesLoader`], and it is the only place services are dropped from.

use std::any::Any;
use std::sync::{Arc, Weak};

use log::info;
use svc_bus::{BusConfig, BusError, Message, MessageBus, Poster, ServiceId, Subscriber, TimerHandle};

use crate::properties::{PropertiesConsumer, PropertiesLoader};

/// A long-lived unit of firmware functionality.
pub trait Service<M: Message>: Any + Send + Sync {
    fn service_id(&self) -> ServiceId;

    /// Called once at boot, after properties were loaded, in ascending
    /// [`ServiceId`] order.
    fn setup(&self, _registry: &Registry<M>) {}
}

struct ServiceEntry<M: Message> {
    id: ServiceId,
    service: Arc<dyn Service<M>>,
    any: Arc<dyn Any + Send + Sync>,
}

impl<M: Message> ServiceEntry<M> {
    fn new<S: Service<M>>(service: Arc<S>) -> Self {
        Self {
            id: service.service_id(),
            any: Arc::clone(&service) as Arc<dyn Any + Send + Sync>,
            service,
        }
    }
}

/// What a service constructor gets to work with: the registry and a weak
/// reference to the service being built, so it can subscribe itself without
/// a reference cycle.
pub struct ServiceContext<'a, M: Message, S> {
    registry: &'a Registry<M>,
    this: &'a Weak<S>,
}

impl<'a, M: Message, S: Send + Sync + 'static> ServiceContext<'a, M, S> {
    pub fn registry(&self) -> &'a Registry<M> {
        self.registry
    }

    pub fn bus(&self) -> &'a MessageBus<M> {
        self.registry.bus()
    }

    pub fn poster(&self) -> Poster<M> {
        self.registry.bus().poster()
    }

    pub fn timers(&self) -> TimerHandle {
        self.registry.bus().timers()
    }

    pub fn this(&self) -> Weak<S> {
        self.this.clone()
    }

    /// Registers the service under construction as a bus subscriber.
    pub fn subscribe(&self)
    where
        S: Subscriber<M>,
    {
        self.registry.bus().subscribe(Arc::new(self.this.clone()));
    }

    /// Registers the service under construction as a properties consumer.
    pub fn consume_properties(&self)
    where
        S: PropertiesConsumer,
    {
        self.registry
            .properties()
            .add_consumer(Arc::new(self.this.clone()));
    }
}

pub struct Registry<M: Message> {
    services: Vec<ServiceEntry<M>>,
    bus: MessageBus<M>,
    properties: PropertiesLoader,
}

impl<M: Message> Registry<M> {
    pub fn new(config: BusConfig) -> Result<Self, BusError> {
        Ok(Self {
            services: Vec::new(),
            bus: MessageBus::new(config)?,
            properties: PropertiesLoader::new(),
        })
    }

    /// Builds a service and takes ownership of it. The constructor receives a
    /// [`ServiceContext`]; the finished service is appended to the managed
    /// list. The returned handle does not keep the service alive.
    pub fn create<S, F>(&mut self, ctor: F) -> Weak<S>
    where
        S: Service<M>,
        F: FnOnce(&ServiceContext<'_, M, S>) -> S,
    {
        let registry: &Self = self;
        let service = Arc::new_cyclic(|this| ctor(&ServiceContext { registry, this }));
        let handle = Arc::downgrade(&service);
        self.add_service(service);
        handle
    }

    /// Adopts a service built elsewhere.
    pub fn add_service<S: Service<M>>(&mut self, service: Arc<S>) {
        self.services.push(ServiceEntry::new(service));
    }

    /// Services in their current order: registration order until
    /// [`sort_services`](Self::sort_services) runs, id order afterwards.
    pub fn services(&self) -> impl Iterator<Item = &Arc<dyn Service<M>>> + '_ {
        self.services.iter().map(|entry| &entry.service)
    }

    pub fn service_ids(&self) -> Vec<ServiceId> {
        self.services.iter().map(|entry| entry.id).collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Looks a service up by id. `None` when no service has that id or when
    /// the one that does is not an `S`.
    pub fn service<S: Service<M>>(&self, id: ServiceId) -> Option<&S> {
        self.services
            .iter()
            .find(|entry| entry.id == id)
            .and_then(|entry| entry.any.downcast_ref::<S>())
    }

    /// Stable sort by ascending [`ServiceId`].
    pub fn sort_services(&mut self) {
        self.services.sort_by_key(|entry| entry.id);
    }

    /// Calls [`Service::setup`] on every service in list order.
    pub fn setup_services(&self) {
        for entry in &self.services {
            entry.service.setup(self);
            info!(target: "app", "setup: {}", entry.id);
        }
    }

    pub fn bus(&self) -> &MessageBus<M> {
        &self.bus
    }

    pub fn properties(&self) -> &PropertiesLoader {
        &self.properties
    }
}
