//! Display-time resolution of weak references.

use super::{AllocationLogEntry, CustomerId, InstanceUrl, PlanId, Port, PortId, PortStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A weak reference resolved against current data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResolvedRef<I, T> {
    /// The referenced record still exists.
    Present {
        /// Stored identifier.
        id: I,
        /// Current value of the referenced record.
        value: T,
    },
    /// The identifier was stored but the record is gone.
    Deleted {
        /// Stored identifier.
        id: I,
    },
    /// No identifier was stored.
    Absent,
}

impl<I: Copy, T> ResolvedRef<I, T> {
    /// Resolves an optional identifier with `lookup`, producing a
    /// placeholder instead of failing when the record is missing.
    pub fn resolve(id: Option<I>, lookup: impl FnOnce(I) -> Option<T>) -> Self {
        match id {
            None => Self::Absent,
            Some(found_id) => lookup(found_id).map_or(Self::Deleted { id: found_id }, |value| {
                Self::Present {
                    id: found_id,
                    value,
                }
            }),
        }
    }

    /// Returns the stored identifier, if any.
    #[must_use]
    pub const fn id(&self) -> Option<I> {
        match self {
            Self::Present { id, .. } | Self::Deleted { id } => Some(*id),
            Self::Absent => None,
        }
    }

    /// Returns the resolved value, if the record still exists.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Present { value, .. } => Some(value),
            Self::Deleted { .. } | Self::Absent => None,
        }
    }

    /// Returns whether the record was referenced but no longer exists.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }
}

impl<I, T: fmt::Display> fmt::Display for ResolvedRef<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present { value, .. } => write!(f, "{value}"),
            Self::Deleted { .. } => f.write_str("(deleted)"),
            Self::Absent => f.write_str("-"),
        }
    }
}

/// Current display data for a port referenced by a log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSummary {
    /// Current instance URL.
    pub instance_url: InstanceUrl,
    /// Current lifecycle status.
    pub status: PortStatus,
}

impl From<&Port> for PortSummary {
    fn from(port: &Port) -> Self {
        Self {
            instance_url: port.details().instance_url().clone(),
            status: port.status(),
        }
    }
}

impl fmt::Display for PortSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.instance_url, self.status)
    }
}

/// A log entry joined with current port, customer and plan data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLogView {
    /// The stored entry.
    pub entry: AllocationLogEntry,
    /// The referenced port.
    pub port: ResolvedRef<PortId, PortSummary>,
    /// The referenced customer's display name.
    pub customer: ResolvedRef<CustomerId, String>,
    /// The referenced plan's display name.
    pub plan: ResolvedRef<PlanId, String>,
}
