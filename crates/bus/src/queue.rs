//! Bounded FIFO shared between producer contexts and the dispatch thread.
//!
//! This is the only structure the bus shares across execution contexts. Items
//! are moved in and moved out; the queue never hands out references to what
//! it stores.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct MessageQueue<T> {
    inner: Mutex<QueueState<T>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> MessageQueue<T> {
    /// Creates a queue holding at most `capacity` items. A capacity of zero
    /// is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Appends `item`, waiting for as long as it takes for space to free up.
    /// Hands the item back once the queue is closed, including to senders
    /// that were already waiting.
    pub fn send(&self, item: T) -> Result<(), T> {
        let mut queue = self.inner.lock();
        while !queue.closed && queue.items.len() >= self.capacity {
            self.not_full.wait(&mut queue);
        }
        if queue.closed {
            return Err(item);
        }
        queue.items.push_back(item);
        drop(queue);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Appends `item` if there is room and the queue is open, otherwise
    /// hands it back.
    pub fn try_send(&self, item: T) -> Result<(), T> {
        let mut queue = self.inner.lock();
        if queue.closed || queue.items.len() >= self.capacity {
            return Err(item);
        }
        queue.items.push_back(item);
        drop(queue);
        self.not_empty.notify_one();
        Ok(())
    }

    pub fn try_receive(&self) -> Option<T> {
        let item = self.inner.lock().items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Pops the oldest item, waiting up to `timeout` for one to arrive. A
    /// closed queue is drained without waiting.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.inner.lock();
        while queue.items.is_empty() && !queue.closed {
            if self.not_empty.wait_until(&mut queue, deadline).timed_out() {
                break;
            }
        }
        let item = queue.items.pop_front();
        drop(queue);
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Refuses every further send and wakes all blocked senders and
    /// receivers. Items already queued can still be received.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
