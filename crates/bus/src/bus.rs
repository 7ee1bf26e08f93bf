//! The message bus.
//!
//! One bus exists per process. Producers either fan a message out on their own
//! thread ([`send_message`](MessageBus::send_message)) or hand it to the post
//! queue ([`post_message`](MessageBus::post_message),
//! [`post_message_isr`](MessageBus::post_message_isr)). A single designated
//! thread drains the queue through [`pump`](MessageBus::pump), the only reader
//! of the queue, and dispatches every entry to every subscriber in
//! registration order.
//!
//! Timers never fan out on their own thread. They only hold a [`Poster`],
//! the enqueue half of the bus, so anything they deliver runs on the dispatch
//! thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, trace, warn};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::config::BusConfig;
use crate::message::{Envelope, Message, TimerCallback};
use crate::queue::MessageQueue;
use crate::subscriber::{FnSubscriber, SubscriberRef};
use crate::timer::{TimerError, TimerHandle, TimerKey, TimerService};

/// Handle returned by [`MessageBus::schedule`] and
/// [`MessageBus::schedule_message`].
pub type ScheduleId = TimerKey;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("message queue is full, message dropped")]
    QueueFull,
    #[error("bus is shutting down, message dropped")]
    Closed,
    #[error("timer service unavailable: {0}")]
    Timer(#[from] TimerError),
}

#[derive(Default)]
struct BusStats {
    posted: AtomicU64,
    dispatched: AtomicU64,
    dropped: AtomicU64,
    panics: AtomicU64,
}

/// Point-in-time copy of the bus counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStatsSnapshot {
    /// Entries accepted by the post queue, timer carriers included.
    pub posted: u64,
    /// Entries taken off the queue and dispatched.
    pub dispatched: u64,
    /// Messages dropped by [`Poster::post_isr`] on a full queue, or by any
    /// post once the bus is shutting down.
    pub dropped: u64,
    /// Subscriber or timer-carrier callbacks that panicked during dispatch.
    pub panics: u64,
}

/// Enqueue-only half of the bus. Cheap to clone and safe to move to other
/// threads, timer callbacks and interrupt-like contexts.
pub struct Poster<M> {
    queue: Arc<MessageQueue<Envelope<M>>>,
    stats: Arc<BusStats>,
}

impl<M> Clone for Poster<M> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<M: Message> Poster<M> {
    /// Moves `msg` into the queue, blocking while the queue is full. Once the
    /// bus is being dropped the message is discarded instead, so a blocked
    /// producer never outlives the bus.
    ///
    /// Never call this from a subscriber: the dispatch thread is the only one
    /// that frees space. Use [`post_isr`](Self::post_isr) there.
    pub fn post(&self, msg: M) {
        match self.queue.send(Envelope::Message(msg)) {
            Ok(()) => {
                self.stats.posted.fetch_add(1, Ordering::Relaxed);
            }
            Err(rejected) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                if let Envelope::Message(msg) = &rejected {
                    debug!(target: "bus", "bus closed, dropped {}", msg.msg_id());
                }
            }
        }
    }

    /// Moves `msg` into the queue without ever waiting. On a full queue the
    /// message is dropped and [`BusError::QueueFull`] returned, or
    /// [`BusError::Closed`] once the bus is being dropped.
    pub fn post_isr(&self, msg: M) -> Result<(), BusError> {
        match self.queue.try_send(Envelope::Message(msg)) {
            Ok(()) => {
                self.stats.posted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(rejected) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                if self.queue.is_closed() {
                    return Err(BusError::Closed);
                }
                if let Envelope::Message(msg) = &rejected {
                    warn!(target: "bus", "queue full, dropped {}", msg.msg_id());
                }
                Err(BusError::QueueFull)
            }
        }
    }

    fn post_timer(&self, callback: TimerCallback) {
        if self.queue.send(Envelope::Timer(callback)).is_ok() {
            self.stats.posted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

pub struct MessageBus<M> {
    config: BusConfig,
    queue: Arc<MessageQueue<Envelope<M>>>,
    subscribers: RwLock<Vec<SubscriberRef<M>>>,
    stats: Arc<BusStats>,
    timers: TimerService,
}

impl<M: Message> MessageBus<M> {
    pub fn new(config: BusConfig) -> Result<Self, BusError> {
        let timers = TimerService::start()?;
        Ok(Self {
            queue: Arc::new(MessageQueue::new(config.queue_capacity)),
            config,
            subscribers: RwLock::new(Vec::new()),
            stats: Arc::new(BusStats::default()),
            timers,
        })
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Registers a subscriber. Registering the same subscriber twice yields
    /// two deliveries per message.
    pub fn subscribe(&self, subscriber: SubscriberRef<M>) {
        self.subscribers.write().push(subscriber);
    }

    pub fn subscribe_fn<F>(&self, callback: F)
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnSubscriber::new(callback)));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Delivers `msg` to every subscriber on the calling thread, bypassing the
    /// queue. Subscribers registered while delivery is in progress do not see
    /// this message.
    pub fn send_message(&self, msg: &M) {
        let subscribers = self.subscribers.read().clone();
        for subscriber in &subscribers {
            self.deliver(subscriber, msg);
        }
    }

    pub fn post_message(&self, msg: M) {
        self.poster().post(msg);
    }

    pub fn post_message_isr(&self, msg: M) -> Result<(), BusError> {
        self.poster().post_isr(msg)
    }

    /// Posts `msg` once `delay` has elapsed. The timer is released after it
    /// fires.
    pub fn schedule_message(&self, delay: Duration, msg: M) -> ScheduleId {
        let poster = self.poster();
        let slot = Mutex::new(Some(msg));
        self.timers.handle().arm_detached(delay, false, move || {
            if let Some(msg) = slot.lock().take() {
                poster.post(msg);
            }
        })
    }

    /// Runs `callback` on the dispatch thread after `delay`, and every `delay`
    /// afterwards when `repeat` is set. A one-shot timer is released after it
    /// fires; a repeating one lives until [`cancel`](Self::cancel) or until
    /// the bus is dropped.
    pub fn schedule<F>(&self, delay: Duration, repeat: bool, callback: F) -> ScheduleId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let poster = self.poster();
        let callback: TimerCallback = Arc::new(callback);
        self.timers.handle().arm_detached(delay, repeat, move || {
            poster.post_timer(Arc::clone(&callback));
        })
    }

    /// Cancels a pending [`schedule`](Self::schedule) or
    /// [`schedule_message`](Self::schedule_message). Returns `false` when the
    /// entry already fired (one-shot) or was cancelled before.
    pub fn cancel(&self, id: ScheduleId) -> bool {
        self.timers.handle().cancel(id)
    }

    /// Timer service owned by the bus, for services that keep their own
    /// [`Timer`](crate::timer::Timer).
    pub fn timers(&self) -> TimerHandle {
        self.timers.handle()
    }

    pub fn poster(&self) -> Poster<M> {
        Poster {
            queue: Arc::clone(&self.queue),
            stats: Arc::clone(&self.stats),
        }
    }

    /// The dispatch loop body. Waits up to the configured receive timeout
    /// for an entry, dispatches every entry that arrives within that window
    /// and returns how many were dispatched.
    ///
    /// Must only be called from the one thread designated to run the bus.
    pub fn pump(&self) -> usize {
        let mut dispatched = 0;
        while let Some(envelope) = self.queue.receive_timeout(self.config.receive_timeout) {
            self.dispatch(envelope);
            dispatched += 1;
        }
        dispatched
    }

    /// Dispatches whatever is queued right now without waiting.
    pub fn run_until_idle(&self) -> usize {
        let mut dispatched = 0;
        while let Some(envelope) = self.queue.try_receive() {
            self.dispatch(envelope);
            dispatched += 1;
        }
        dispatched
    }

    /// Number of entries waiting in the post queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> BusStatsSnapshot {
        BusStatsSnapshot {
            posted: self.stats.posted.load(Ordering::Relaxed),
            dispatched: self.stats.dispatched.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            panics: self.stats.panics.load(Ordering::Relaxed),
        }
    }
}

impl<M> Drop for MessageBus<M> {
    fn drop(&mut self) {
        // Release timer callbacks blocked on a full queue before the timer
        // service joins its thread.
        self.queue.close();
    }
}

impl<M: Message> MessageBus<M> {
    fn dispatch(&self, envelope: Envelope<M>) {
        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        match envelope {
            Envelope::Message(msg) => {
                trace!(target: "bus", "dispatch {}", msg.msg_id());
                self.send_message(&msg);
            }
            Envelope::Timer(callback) => {
                if panic::catch_unwind(AssertUnwindSafe(|| (*callback)())).is_err() {
                    self.stats.panics.fetch_add(1, Ordering::Relaxed);
                    error!(target: "bus", "scheduled callback panicked");
                }
            }
        }
    }

    fn deliver(&self, subscriber: &SubscriberRef<M>, msg: &M) {
        if panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_message(msg))).is_err() {
            self.stats.panics.fetch_add(1, Ordering::Relaxed);
            error!(target: "bus", "subscriber panicked while handling {}", msg.msg_id());
        }
    }
}
