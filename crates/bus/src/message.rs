//! Message primitives.
//!
//! Each subsystem describes its traffic as one closed enum and implements
//! [`Message`] for it, so dispatch is an exhaustive `match` over variants
//! instead of a comparison of numeric ids against a shared base type. The
//! numeric [`MessageTypeId`] is still carried for logging and for
//! [`Handlers`](crate::subscriber::Handlers) tables.
//!
//! Messages move by value. Posting gives up ownership; the bus owns the value
//! while it is queued and for the duration of one dispatch pass, then drops
//! it.

use std::sync::Arc;

use crate::id::MessageTypeId;

/// A value that can travel over the bus.
pub trait Message: Send + 'static {
    fn msg_id(&self) -> MessageTypeId;
}

/// Implemented by an application message enum that nests the enum of a
/// subsystem, letting that subsystem's services run on the application bus.
///
/// ```ignore
/// enum AppMessage {
///     Sys(SysMessage),
///     Status(StatusMessage),
/// }
///
/// impl Embeds<SysMessage> for AppMessage {
///     fn peek(&self) -> Option<&SysMessage> {
///         match self {
///             Self::Sys(msg) => Some(msg),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Embeds<T>: From<T> {
    fn peek(&self) -> Option<&T>;
}

impl<T> Embeds<T> for T {
    #[inline]
    fn peek(&self) -> Option<&T> {
        Some(self)
    }
}

/// Zero-argument callback delivered through the bus by a timer.
pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// Queue entry. Timer callbacks ride the same FIFO as application messages
/// so they run on the dispatch thread, never on the timer thread.
pub(crate) enum Envelope<M> {
    Message(M),
    Timer(TimerCallback),
}
