//! Periodic device status report.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use svc_bus::{Message, Poster, ServiceId, Subsystem, Timer};
use svc_registry::{Registry, Service, ServiceContext};

pub const STATUS_SERVICE: ServiceId = ServiceId::new(Subsystem::User, 0);
pub const STATUS_PERIOD: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub status: String,
    /// Milliseconds since boot.
    pub timestamp: u32,
}

/// Posts a [`StatusMessage`] every `period` once set up.
pub struct StatusService<M: Message> {
    timer: Mutex<Timer>,
    poster: Poster<M>,
    period: Duration,
    booted: Instant,
}

impl<M> StatusService<M>
where
    M: Message + From<StatusMessage>,
{
    pub fn new(ctx: &ServiceContext<'_, M, Self>, period: Duration) -> Self {
        Self {
            timer: Mutex::new(ctx.timers().timer()),
            poster: ctx.poster(),
            period,
            booted: Instant::now(),
        }
    }
}

impl<M> Service<M> for StatusService<M>
where
    M: Message + From<StatusMessage>,
{
    fn service_id(&self) -> ServiceId {
        STATUS_SERVICE
    }

    fn setup(&self, _registry: &Registry<M>) {
        let poster = self.poster.clone();
        let booted = self.booted;
        // Runs on the timer thread: never block on a full queue.
        self.timer.lock().attach(self.period, true, move || {
            let timestamp = u32::try_from(booted.elapsed().as_millis()).unwrap_or(u32::MAX);
            let _ = poster.post_isr(M::from(StatusMessage {
                status: "active".into(),
                timestamp,
            }));
        });
    }
}
