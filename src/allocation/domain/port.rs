//! Port aggregate root and its lifecycle state machine.

use super::{AllocationAction, PortDetails, PortDomainError, PortId, PortStatus, SubscriptionId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// A provisionable tenant instance and its allocation state.
///
/// `assigned_subscription_id` and `assigned_at` are set exactly when the
/// status is [`PortStatus::Assigned`]. Every mutation bumps `version`, which
/// stores use as an optimistic concurrency token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    id: PortId,
    details: PortDetails,
    status: PortStatus,
    assigned_subscription_id: Option<SubscriptionId>,
    assigned_at: Option<DateTime<Utc>>,
    last_subscription_id: Option<SubscriptionId>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedPortData {
    /// Persisted port identifier.
    pub id: PortId,
    /// Persisted connection descriptors and metadata.
    pub details: PortDetails,
    /// Persisted lifecycle status.
    pub status: PortStatus,
    /// Persisted active subscription, if any.
    pub assigned_subscription_id: Option<SubscriptionId>,
    /// Persisted assignment timestamp, if any.
    pub assigned_at: Option<DateTime<Utc>>,
    /// Persisted subscription most recently released from the port.
    pub last_subscription_id: Option<SubscriptionId>,
    /// Persisted concurrency token.
    pub version: u64,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Port {
    /// Creates a new port in [`PortStatus::Available`].
    #[must_use]
    pub fn new(details: PortDetails, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: PortId::new(),
            details,
            status: PortStatus::Available,
            assigned_subscription_id: None,
            assigned_at: None,
            last_subscription_id: None,
            version: 1,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a port from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedPortData) -> Self {
        Self {
            id: data.id,
            details: data.details,
            status: data.status,
            assigned_subscription_id: data.assigned_subscription_id,
            assigned_at: data.assigned_at,
            last_subscription_id: data.last_subscription_id,
            version: data.version,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the port identifier.
    #[must_use]
    pub const fn id(&self) -> PortId {
        self.id
    }

    /// Returns the connection descriptors and metadata.
    #[must_use]
    pub const fn details(&self) -> &PortDetails {
        &self.details
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> PortStatus {
        self.status
    }

    /// Returns the subscription the port is bound to, if assigned.
    #[must_use]
    pub const fn assigned_subscription_id(&self) -> Option<SubscriptionId> {
        self.assigned_subscription_id
    }

    /// Returns when the current assignment was made, if assigned.
    #[must_use]
    pub const fn assigned_at(&self) -> Option<DateTime<Utc>> {
        self.assigned_at
    }

    /// Returns the subscription most recently released from this port.
    #[must_use]
    pub const fn last_subscription_id(&self) -> Option<SubscriptionId> {
        self.last_subscription_id
    }

    /// Returns the optimistic concurrency token.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns whether the assignment fields agree with the status.
    #[must_use]
    pub const fn assignment_is_consistent(&self) -> bool {
        let assigned = matches!(self.status, PortStatus::Assigned);
        self.assigned_subscription_id.is_some() == assigned && self.assigned_at.is_some() == assigned
    }

    /// Binds the port to a subscription.
    ///
    /// Returns [`AllocationAction::Reassigned`] when the port last served a
    /// different subscription, otherwise [`AllocationAction::Assigned`].
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::IllegalTransition`] unless the port is
    /// available or reserved.
    pub fn assign(
        &mut self,
        subscription_id: SubscriptionId,
        clock: &impl Clock,
    ) -> Result<AllocationAction, PortDomainError> {
        if !self.status.can_assign() {
            return Err(self.illegal("assign"));
        }

        let action = match self.last_subscription_id {
            Some(previous) if previous != subscription_id => AllocationAction::Reassigned,
            _ => AllocationAction::Assigned,
        };

        let timestamp = clock.utc();
        self.status = PortStatus::Assigned;
        self.assigned_subscription_id = Some(subscription_id);
        self.assigned_at = Some(timestamp);
        self.touch_at(timestamp);
        Ok(action)
    }

    /// Returns the port to the pool and yields the subscription it served.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::IllegalTransition`] unless the port is
    /// assigned.
    pub fn release(&mut self, clock: &impl Clock) -> Result<SubscriptionId, PortDomainError> {
        let (PortStatus::Assigned, Some(subscription_id)) =
            (self.status, self.assigned_subscription_id)
        else {
            return Err(self.illegal("release"));
        };

        self.status = PortStatus::Available;
        self.assigned_subscription_id = None;
        self.assigned_at = None;
        self.last_subscription_id = Some(subscription_id);
        self.touch(clock);
        Ok(subscription_id)
    }

    /// Holds an available port for a checkout in progress.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::IllegalTransition`] unless the port is
    /// available.
    pub fn reserve(&mut self, clock: &impl Clock) -> Result<(), PortDomainError> {
        self.move_between(PortStatus::Available, PortStatus::Reserved, "reserve", clock)
    }

    /// Drops a checkout hold.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::IllegalTransition`] unless the port is
    /// reserved.
    pub fn make_available(&mut self, clock: &impl Clock) -> Result<(), PortDomainError> {
        self.move_between(
            PortStatus::Reserved,
            PortStatus::Available,
            "make available",
            clock,
        )
    }

    /// Withdraws the port from the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::IllegalTransition`] when the port is
    /// assigned (it must be released first) or already disabled.
    pub fn disable(&mut self, clock: &impl Clock) -> Result<(), PortDomainError> {
        if !self.status.can_disable() {
            return Err(self.illegal("disable"));
        }
        self.status = PortStatus::Disabled;
        self.touch(clock);
        Ok(())
    }

    /// Returns a disabled port to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::IllegalTransition`] unless the port is
    /// disabled.
    pub fn enable(&mut self, clock: &impl Clock) -> Result<(), PortDomainError> {
        self.move_between(PortStatus::Disabled, PortStatus::Available, "enable", clock)
    }

    /// Replaces the connection descriptors and metadata.
    pub fn update_details(&mut self, details: PortDetails, clock: &impl Clock) {
        self.details = details;
        self.touch(clock);
    }

    /// Validates that the port may be removed from the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::DeleteAssignedPort`] when the port is
    /// assigned.
    pub const fn ensure_deletable(&self) -> Result<(), PortDomainError> {
        if matches!(self.status, PortStatus::Assigned) {
            return Err(PortDomainError::DeleteAssignedPort(self.id));
        }
        Ok(())
    }

    fn move_between(
        &mut self,
        from: PortStatus,
        to: PortStatus,
        operation: &'static str,
        clock: &impl Clock,
    ) -> Result<(), PortDomainError> {
        if self.status != from {
            return Err(self.illegal(operation));
        }
        self.status = to;
        self.touch(clock);
        Ok(())
    }

    const fn illegal(&self, operation: &'static str) -> PortDomainError {
        PortDomainError::IllegalTransition {
            port_id: self.id,
            operation,
            status: self.status,
        }
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.touch_at(clock.utc());
    }

    const fn touch_at(&mut self, timestamp: DateTime<Utc>) {
        self.updated_at = timestamp;
        self.version = self.version.saturating_add(1);
    }
}
