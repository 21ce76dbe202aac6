//! Identifier types for the port allocation domain.
//!
//! [`PortId`] and [`LogEntryId`] are owned by this crate. The remaining
//! identifiers point at records owned by other subsystems and are stored as
//! weak references: nothing guarantees the referent still exists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the wrapped UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(value.trim()).map(Self)
            }
        }
    };
}

uuid_identifier!(
    /// Unique identifier for a provisionable tenant port.
    PortId
);

uuid_identifier!(
    /// Unique identifier for an allocation log entry.
    LogEntryId
);

uuid_identifier!(
    /// Identifier of a customer subscription owned by the billing subsystem.
    SubscriptionId
);

uuid_identifier!(
    /// Identifier of a customer owned by the customer subsystem.
    CustomerId
);

uuid_identifier!(
    /// Identifier of a subscription plan owned by the catalogue subsystem.
    PlanId
);

uuid_identifier!(
    /// Identifier of an administrator account.
    AdminUserId
);
