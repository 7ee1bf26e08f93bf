use serde::Deserialize;
use svc_bus::{Message, MessageTypeId, PropertyTypeId, Subsystem};

use crate::properties::Properties;


#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Note {
    Hello(u8),
}

impl Message for Note {
    fn msg_id(&self) -> MessageTypeId {
        match self {
            Self::Hello(_) => MessageTypeId::new(Subsystem::User, 0),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct NetProps {
    pub ssid: String,
    pub password: String,
}

impl Properties for NetProps {
    const ID: PropertyTypeId = PropertyTypeId::new(Subsystem::Core, 0);
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct BrokerProps {
    pub uri: String,
    pub keep_alive: u16,
}

impl Properties for BrokerProps {
    const ID: PropertyTypeId = PropertyTypeId::new(Subsystem::Core, 1);
}
