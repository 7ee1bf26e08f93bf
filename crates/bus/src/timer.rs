//! Timer services.
//!
//! [`TimerService`] owns one thread, the execution context in which every
//! timer callback runs. Deadlines are absolute monotonic instants, and a
//! periodic entry re-arms at `deadline + period` so the period does not drift
//! with callback latency.
//!
//! A [`Timer`] is the scoped owner of one entry: dropping it cancels the
//! entry whether or not it is still pending. One-shot entries leave the
//! service as soon as they fire. A cancelled entry never starts another
//! call, but a call already running on the timer thread when
//! [`Timer::detach`] returns is allowed to finish.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, trace};
use parking_lot::{Condvar, Mutex, MutexGuard};
use thiserror::Error;

use crate::message::TimerCallback;

/// Shortest period a repeating entry may have.
const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerKey(u64);

#[derive(Error, Debug)]
pub enum TimerError {
    #[error("failed to spawn timer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

struct Entry {
    deadline: Instant,
    period: Option<Duration>,
    callback: TimerCallback,
}

struct TimerState {
    entries: HashMap<TimerKey, Entry>,
    next_key: u64,
    running: bool,
}

impl TimerState {
    fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|entry| entry.deadline).min()
    }

    /// Keys due at `now` in deadline order. Periodic entries are re-armed
    /// here; one-shot entries stay until [`claim`](Self::claim) retires them.
    fn take_due(&mut self, now: Instant) -> Vec<TimerKey> {
        let mut due: Vec<(Instant, TimerKey)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(key, entry)| (entry.deadline, *key))
            .collect();
        due.sort();

        for (_, key) in &due {
            if let Some(entry) = self.entries.get_mut(key) {
                if let Some(period) = entry.period {
                    entry.deadline += period;
                    if entry.deadline <= now {
                        entry.deadline = now + period;
                    }
                }
            }
        }
        due.into_iter().map(|(_, key)| key).collect()
    }

    /// The callback to fire for `key`, or `None` when the entry was cancelled
    /// since it became due. Retires one-shot entries.
    fn claim(&mut self, key: TimerKey) -> Option<TimerCallback> {
        let periodic = self.entries.get(&key)?.period.is_some();
        if periodic {
            return self.entries.get(&key).map(|entry| Arc::clone(&entry.callback));
        }
        trace!(target: "timer", "one-shot {key:?} retired");
        self.entries.remove(&key).map(|entry| entry.callback)
    }
}

struct TimerShared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

/// Cloneable access to a running [`TimerService`].
#[derive(Clone)]
pub struct TimerHandle {
    shared: Arc<TimerShared>,
}

impl TimerHandle {
    /// Creates an unarmed [`Timer`] bound to this service.
    pub fn timer(&self) -> Timer {
        Timer {
            handle: self.clone(),
            key: None,
        }
    }

    /// Arms an entry that no [`Timer`] owns. One-shot entries are released
    /// after firing; repeating ones live until [`cancel`](Self::cancel) or
    /// until the service stops.
    pub fn arm_detached<F>(&self, delay: Duration, repeat: bool, callback: F) -> TimerKey
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.arm(delay, repeat, Arc::new(callback))
    }

    pub fn cancel(&self, key: TimerKey) -> bool {
        let removed = self.shared.state.lock().entries.remove(&key).is_some();
        if removed {
            self.shared.wake.notify_one();
        }
        removed
    }

    pub fn is_armed(&self, key: TimerKey) -> bool {
        self.shared.state.lock().entries.contains_key(&key)
    }

    /// Number of entries currently held by the service.
    pub fn active(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    fn arm(&self, delay: Duration, repeat: bool, callback: TimerCallback) -> TimerKey {
        let mut state = self.shared.state.lock();
        let key = TimerKey(state.next_key);
        state.next_key += 1;
        let period = repeat.then(|| delay.max(MIN_PERIOD));
        state.entries.insert(
            key,
            Entry {
                deadline: Instant::now() + delay,
                period,
                callback,
            },
        );
        drop(state);
        self.shared.wake.notify_one();
        trace!(target: "timer", "armed {key:?} delay={delay:?} repeat={repeat}");
        key
    }
}

/// Owner of the timer thread.
pub struct TimerService {
    handle: TimerHandle,
    thread: Option<JoinHandle<()>>,
}

impl TimerService {
    pub fn start() -> Result<Self, TimerError> {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                entries: HashMap::new(),
                next_key: 0,
                running: true,
            }),
            wake: Condvar::new(),
        });
        let worker = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("svc-timer".into())
            .spawn(move || timer_thread(worker))?;
        Ok(Self {
            handle: TimerHandle { shared },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> TimerHandle {
        self.handle.clone()
    }

    pub fn timer(&self) -> Timer {
        self.handle.timer()
    }

    pub fn active(&self) -> usize {
        self.handle.active()
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        {
            let mut state = self.handle.shared.state.lock();
            state.running = false;
            state.entries.clear();
        }
        self.handle.shared.wake.notify_all();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

fn timer_thread(shared: Arc<TimerShared>) {
    let mut state = shared.state.lock();
    while state.running {
        let now = Instant::now();
        match state.next_deadline() {
            None => {
                shared.wake.wait(&mut state);
                continue;
            }
            Some(deadline) if deadline > now => {
                shared.wake.wait_until(&mut state, deadline);
                continue;
            }
            Some(_) => {}
        }

        // Each key is claimed right before its call, so an entry cancelled by
        // an earlier callback of the same batch does not fire.
        for key in state.take_due(now) {
            if !state.running {
                break;
            }
            if let Some(callback) = state.claim(key) {
                MutexGuard::unlocked(&mut state, || fire(&callback));
            }
        }
    }
}

fn fire(callback: &TimerCallback) {
    if panic::catch_unwind(AssertUnwindSafe(|| (**callback)())).is_err() {
        error!(target: "timer", "timer callback panicked");
    }
}

/// Scoped timer: at most one armed entry, cancelled on drop.
pub struct Timer {
    handle: TimerHandle,
    key: Option<TimerKey>,
}

impl Timer {
    /// Arms the timer to run `callback` after `delay`, and every `delay`
    /// afterwards when `repeat` is set. Attaching an armed timer cancels the
    /// previous arming first; its period is not preserved.
    pub fn attach<F>(&mut self, delay: Duration, repeat: bool, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.detach();
        self.key = Some(self.handle.arm(delay, repeat, Arc::new(callback)));
    }

    pub fn detach(&mut self) {
        if let Some(key) = self.key.take() {
            self.handle.cancel(key);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.key.map_or(false, |key| self.handle.is_armed(key))
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.detach();
    }
}
