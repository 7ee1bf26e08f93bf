//! Subscriber abstraction.
//!
//! A subscriber is a long-lived registration that sees every message the bus
//! dispatches and reacts to the variants it cares about. It never owns a
//! message, only borrows it for the duration of the callback.

use std::sync::{Arc, Weak};

use crate::id::MessageTypeId;
use crate::message::Message;

pub trait Subscriber<M>: Send + Sync {
    fn on_message(&self, msg: &M);
}

pub type SubscriberRef<M> = Arc<dyn Subscriber<M>>;

/// Services subscribe through a weak self reference so the bus never keeps
/// a service alive on its own.
impl<M, T> Subscriber<M> for Weak<T>
where
    T: Subscriber<M> + Send + Sync,
{
    fn on_message(&self, msg: &M) {
        if let Some(target) = self.upgrade() {
            target.on_message(msg);
        }
    }
}

/// Adapter for plain closures.
pub struct FnSubscriber<F> {
    callback: F,
}

impl<F> FnSubscriber<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<M, F> Subscriber<M> for FnSubscriber<F>
where
    F: Fn(&M) + Send + Sync,
{
    fn on_message(&self, msg: &M) {
        (self.callback)(msg);
    }
}

type Handler<M> = Box<dyn Fn(&M) + Send + Sync>;

/// Table of `(id, handler)` pairs.
///
/// The first handler whose id matches the message runs; messages with no
/// matching entry are ignored. There is no limit on the number of entries.
pub struct Handlers<M> {
    entries: Vec<(MessageTypeId, Handler<M>)>,
}

impl<M: Message> Handlers<M> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn on<F>(mut self, id: MessageTypeId, handler: F) -> Self
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.entries.push((id, Box::new(handler)));
        self
    }

    pub fn accepts(&self, id: MessageTypeId) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<M: Message> Default for Handlers<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> Subscriber<M> for Handlers<M> {
    fn on_message(&self, msg: &M) {
        let id = msg.msg_id();
        if let Some((_, handler)) = self.entries.iter().find(|(entry, _)| *entry == id) {
            handler(msg);
        }
    }
}
