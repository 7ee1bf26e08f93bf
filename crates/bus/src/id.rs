//! Subsystem-scoped identifiers.
//!
//! Messages, services and properties are all named by a 16-bit value whose
//! high byte is the [`Subsystem`] that defines them and whose low byte is a
//! code local to that subsystem. Identifiers are computed in `const` context
//! and never change at runtime.

use core::fmt;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// High-order discriminator separating the id spaces of framework modules.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Subsystem {
    /// Reserved for the bus itself (timer carriers).
    Bus = 0,
    /// Services shipped with the framework (connectivity, broker client).
    Core = 1,
    /// Application-defined services and messages.
    User = 2,
}

impl Subsystem {
    pub const fn raw(self) -> u8 {
        self as u8
    }

    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Bus),
            1 => Some(Self::Core),
            2 => Some(Self::User),
            _ => None,
        }
    }
}

macro_rules! subsystem_id {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u16);

        impl $name {
            pub const fn new(subsystem: Subsystem, local: u8) -> Self {
                Self(local as u16 | ((subsystem as u16) << 8))
            }

            pub const fn from_raw(raw: u16) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u16 {
                self.0
            }

            /// Subsystem half of the id, `None` for a discriminator no
            /// subsystem claims.
            pub const fn subsystem(self) -> Option<Subsystem> {
                Subsystem::from_raw((self.0 >> 8) as u8)
            }

            pub const fn local(self) -> u8 {
                (self.0 & 0xff) as u8
            }
        }

        impl From<$name> for u16 {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "({:#06x})"), self.0)
            }
        }
    };
}

subsystem_id!(
    /// Identifier of one message variant.
    MessageTypeId,
    "MSG"
);

subsystem_id!(
    /// Identity and setup-order key of a service.
    ServiceId,
    "SVC"
);

subsystem_id!(
    /// Identifier of one configuration object kind.
    PropertyTypeId,
    "PROP"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_composes_subsystem_and_local_code() {
        let id = MessageTypeId::new(Subsystem::Core, 3);
        assert_eq!(id.raw(), 0x0103);
        assert_eq!(id.subsystem(), Some(Subsystem::Core));
        assert_eq!(id.local(), 3);
        assert_eq!(id.to_string(), "MSG(0x0103)");
    }

    #[test]
    fn service_ids_order_by_subsystem_first() {
        let core = ServiceId::new(Subsystem::Core, 9);
        let user = ServiceId::new(Subsystem::User, 0);
        assert!(core < user);
        assert_eq!(ServiceId::from_raw(0x7f00).subsystem(), None);
    }
}
