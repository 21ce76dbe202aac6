//! Allocation log action vocabulary.

use super::ParseAllocationActionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of state change recorded in the allocation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationAction {
    /// A port was bound to a subscription.
    Assigned,
    /// A port was bound to a subscription other than the one it last served.
    Reassigned,
    /// An administrator released a port back to the pool.
    Released,
    /// The subscription workflow released a port when its subscription
    /// ended.
    Unassigned,
    /// A port was added to the pool.
    Created,
    /// A port was withdrawn from the pool.
    Disabled,
    /// A withdrawn port was returned to the pool.
    Enabled,
    /// A port was held for a checkout.
    Reserved,
    /// A checkout hold was dropped.
    MadeAvailable,
    /// Free-form status edit written by the legacy admin pages. Never
    /// produced by this crate.
    StatusChanged,
}

impl AllocationAction {
    /// The complete action vocabulary.
    pub const ALL: [Self; 10] = [
        Self::Assigned,
        Self::Reassigned,
        Self::Released,
        Self::Unassigned,
        Self::Created,
        Self::Disabled,
        Self::Enabled,
        Self::Reserved,
        Self::MadeAvailable,
        Self::StatusChanged,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "ASSIGNED",
            Self::Reassigned => "REASSIGNED",
            Self::Released => "RELEASED",
            Self::Unassigned => "UNASSIGNED",
            Self::Created => "CREATED",
            Self::Disabled => "DISABLED",
            Self::Enabled => "ENABLED",
            Self::Reserved => "RESERVED",
            Self::MadeAvailable => "MADE_AVAILABLE",
            Self::StatusChanged => "STATUS_CHANGED",
        }
    }
}

impl fmt::Display for AllocationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AllocationAction {
    type Error = ParseAllocationActionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| ParseAllocationActionError(value.to_owned()))
    }
}
