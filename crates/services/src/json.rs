//! JSON bridge between broker payloads and bus messages.

use serde::de::DeserializeOwned;
use serde::Serialize;
use svc_bus::{BusError, Embeds, Message, Poster};
use thiserror::Error;

use crate::messages::SysMessage;

#[derive(Error, Debug)]
pub enum SendJsonError {
    #[error("cannot serialize payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Decodes `payload` as `E` and posts it. Nothing is posted when the payload
/// is not valid JSON for `E`.
///
/// Blocks while the queue is full, so call it from a driver thread such as
/// a broker topic callback, not from a bus subscriber.
pub fn recv_json<M, E>(poster: &Poster<M>, payload: &[u8]) -> Result<(), serde_json::Error>
where
    M: Message + From<E>,
    E: DeserializeOwned,
{
    let event: E = serde_json::from_slice(payload)?;
    poster.post(M::from(event));
    Ok(())
}

/// Serializes `msg` and posts it as an outbound `MqttMessage` on `topic`.
///
/// Never waits for queue space: replies are usually sent from a subscriber
/// on the dispatch thread, the one thread that drains the queue. On a full
/// queue the message is dropped and [`SendJsonError::Bus`] returned.
pub fn send_json<M, T>(poster: &Poster<M>, topic: &str, msg: &T) -> Result<(), SendJsonError>
where
    M: Message + Embeds<SysMessage>,
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_string_pretty(msg)?;
    poster.post_isr(M::from(SysMessage::MqttMessage {
        topic: topic.to_owned(),
        payload,
        qos: 0,
    }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use serde::Deserialize;
    use svc_bus::{BusConfig, MessageBus, MessageTypeId, Subsystem};

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Action {
        #[serde(rename = "action-id")]
        action_id: u8,
    }

    #[derive(Debug, PartialEq)]
    enum Mixed {
        Sys(SysMessage),
        Action(Action),
    }

    impl Message for Mixed {
        fn msg_id(&self) -> MessageTypeId {
            match self {
                Self::Sys(msg) => msg.msg_id(),
                Self::Action(_) => MessageTypeId::new(Subsystem::User, 0),
            }
        }
    }

    impl From<SysMessage> for Mixed {
        fn from(msg: SysMessage) -> Self {
            Self::Sys(msg)
        }
    }

    impl From<Action> for Mixed {
        fn from(msg: Action) -> Self {
            Self::Action(msg)
        }
    }

    impl Embeds<SysMessage> for Mixed {
        fn peek(&self) -> Option<&SysMessage> {
            match self {
                Self::Sys(msg) => Some(msg),
                _ => None,
            }
        }
    }

    fn collect(bus: &MessageBus<Mixed>) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe_fn(move |msg: &Mixed| sink.lock().unwrap().push(format!("{msg:?}")));
        seen
    }

    #[test]
    fn valid_payload_is_posted_as_event() {
        let bus = MessageBus::<Mixed>::new(BusConfig::default()).unwrap();
        let seen = collect(&bus);

        recv_json::<Mixed, Action>(&bus.poster(), br#"{ "action-id": 7 }"#).unwrap();
        assert!(recv_json::<Mixed, Action>(&bus.poster(), b"{ broken").is_err());
        bus.run_until_idle();

        assert_eq!(*seen.lock().unwrap(), vec!["Action(Action { action_id: 7 })"]);
    }

    #[test]
    fn outbound_message_carries_serialized_payload() {
        let bus = MessageBus::<Mixed>::new(BusConfig::default()).unwrap();
        let posted = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&posted);
        bus.subscribe_fn(move |msg: &Mixed| {
            let outbound = Embeds::<SysMessage>::peek(msg);
            if let Some(SysMessage::MqttMessage { topic, payload, qos }) = outbound {
                *sink.lock().unwrap() = Some((topic.clone(), payload.clone(), *qos));
            }
        });

        send_json(&bus.poster(), "/reply", &Action { action_id: 3 }).unwrap();
        bus.run_until_idle();

        let (topic, payload, qos) = posted.lock().unwrap().take().unwrap();
        assert_eq!(topic, "/reply");
        assert_eq!(qos, 0);
        let decoded: Action = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded, Action { action_id: 3 });
    }

    #[test]
    fn reply_from_a_subscriber_on_a_full_queue_is_dropped() {
        let bus = MessageBus::<Mixed>::new(BusConfig::builder().queue_capacity(1).build()).unwrap();
        let poster = bus.poster();
        let outcome = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&outcome);
        bus.subscribe_fn(move |msg: &Mixed| {
            if let Mixed::Action(action) = msg {
                let sent = send_json(&poster, "/reply", action);
                *sink.lock().unwrap() = Some(sent);
            }
        });
        bus.post_message(Mixed::Sys(SysMessage::MqttConnected));

        // Runs the subscriber on this thread while the queue is full.
        bus.send_message(&Mixed::Action(Action { action_id: 1 }));

        let sent = outcome.lock().unwrap().take().unwrap();
        assert!(matches!(sent, Err(SendJsonError::Bus(BusError::QueueFull))));
        assert_eq!(bus.pending(), 1);
        assert_eq!(bus.stats().dropped, 1);
    }
}
