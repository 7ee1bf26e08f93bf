//! Tests for BusConfig builder and functionality.

use std::time::Duration;

use svc_bus::{BusConfig, MessageBus, MessageTypeId, Message, Subsystem};

struct Beacon;

impl Message for Beacon {
    fn msg_id(&self) -> MessageTypeId {
        MessageTypeId::new(Subsystem::User, 1)
    }
}

#[test]
fn bus_config_default() {
    let config = BusConfig::default();

    assert_eq!(config.queue_capacity, 10);
    assert_eq!(config.receive_timeout, Duration::from_millis(100));
}

#[test]
fn bus_config_builder() {
    let config = BusConfig::builder()
        .queue_capacity(32)
        .receive_timeout(Duration::from_millis(5))
        .build();

    assert_eq!(config.queue_capacity, 32);
    assert_eq!(config.receive_timeout, Duration::from_millis(5));
}

#[test]
fn bus_with_custom_config() {
    let config = BusConfig::builder().queue_capacity(3).build();
    let bus: MessageBus<Beacon> = MessageBus::new(config).unwrap();

    assert_eq!(bus.config().queue_capacity, 3);
    for _ in 0..3 {
        bus.post_message_isr(Beacon).unwrap();
    }
    assert!(bus.post_message_isr(Beacon).is_err());
    assert_eq!(bus.run_until_idle(), 3);

    let stats = bus.stats();
    assert_eq!(stats.posted, 3);
    assert_eq!(stats.dispatched, 3);
    assert_eq!(stats.dropped, 1);
}
