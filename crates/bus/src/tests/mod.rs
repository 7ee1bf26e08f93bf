use crate::id::{MessageTypeId, Subsystem};
use crate::message::Message;

mod timer;

pub(crate) const PING: MessageTypeId = MessageTypeId::new(Subsystem::User, 0);
pub(crate) const PONG: MessageTypeId = MessageTypeId::new(Subsystem::User, 1);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TestMsg {
    Ping(u32),
    Pong(u32),
}

impl Message for TestMsg {
    fn msg_id(&self) -> MessageTypeId {
        match self {
            Self::Ping(_) => PING,
            Self::Pong(_) => PONG,
        }
    }
}
