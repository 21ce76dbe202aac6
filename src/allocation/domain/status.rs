//! Port lifecycle status.

use super::ParsePortStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a provisionable port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortStatus {
    /// The port is free and can be reserved or assigned.
    Available,
    /// The port is held for a checkout in progress.
    Reserved,
    /// The port is bound to exactly one subscription.
    Assigned,
    /// The port has been withdrawn from the pool by an administrator.
    Disabled,
}

impl PortStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::Available,
        Self::Reserved,
        Self::Assigned,
        Self::Disabled,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Reserved => "reserved",
            Self::Assigned => "assigned",
            Self::Disabled => "disabled",
        }
    }

    /// Returns whether a port in this status may be bound to a subscription.
    #[must_use]
    pub const fn can_assign(self) -> bool {
        matches!(self, Self::Available | Self::Reserved)
    }

    /// Returns whether a port in this status may be disabled.
    #[must_use]
    pub const fn can_disable(self) -> bool {
        matches!(self, Self::Available | Self::Reserved)
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for PortStatus {
    type Error = ParsePortStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "available" => Ok(Self::Available),
            "reserved" => Ok(Self::Reserved),
            "assigned" => Ok(Self::Assigned),
            "disabled" => Ok(Self::Disabled),
            _ => Err(ParsePortStatusError(value.to_owned())),
        }
    }
}

/// Number of ports in each lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Ports free for allocation.
    pub available: u64,
    /// Ports held for checkout.
    pub reserved: u64,
    /// Ports bound to a subscription.
    pub assigned: u64,
    /// Ports withdrawn from the pool.
    pub disabled: u64,
}

impl StatusCounts {
    /// Adds `count` ports in `status`.
    pub const fn add(&mut self, status: PortStatus, count: u64) {
        let slot = match status {
            PortStatus::Available => &mut self.available,
            PortStatus::Reserved => &mut self.reserved,
            PortStatus::Assigned => &mut self.assigned,
            PortStatus::Disabled => &mut self.disabled,
        };
        *slot = slot.saturating_add(count);
    }

    /// Returns the number of ports in `status`.
    #[must_use]
    pub const fn get(&self, status: PortStatus) -> u64 {
        match status {
            PortStatus::Available => self.available,
            PortStatus::Reserved => self.reserved,
            PortStatus::Assigned => self.assigned,
            PortStatus::Disabled => self.disabled,
        }
    }

    /// Returns the size of the whole pool.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.available
            .saturating_add(self.reserved)
            .saturating_add(self.assigned)
            .saturating_add(self.disabled)
    }
}
