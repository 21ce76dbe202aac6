//! Append-only allocation log entries.

use super::{
    AdminUserId, AllocationAction, CustomerId, LogEntryId, PlanId, PortDomainError, PortId,
    Principal, SubscriptionId, SubscriptionSummary,
    details::{LOG_NOTES_LIMIT, normalize_optional},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// One audit record of a port state change.
///
/// Every reference is weak: the log keeps identifiers even after the port,
/// customer, subscription or plan row has been deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLogEntry {
    id: LogEntryId,
    action: AllocationAction,
    port_id: Option<PortId>,
    customer_id: Option<CustomerId>,
    subscription_id: Option<SubscriptionId>,
    plan_id: Option<PlanId>,
    performed_by: Option<AdminUserId>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedLogEntryData {
    /// Persisted entry identifier.
    pub id: LogEntryId,
    /// Persisted action.
    pub action: AllocationAction,
    /// Persisted port reference.
    pub port_id: Option<PortId>,
    /// Persisted customer reference.
    pub customer_id: Option<CustomerId>,
    /// Persisted subscription reference.
    pub subscription_id: Option<SubscriptionId>,
    /// Persisted plan reference.
    pub plan_id: Option<PlanId>,
    /// Persisted administrator reference; `None` for system actions.
    pub performed_by: Option<AdminUserId>,
    /// Persisted notes.
    pub notes: Option<String>,
    /// Persisted timestamp.
    pub created_at: DateTime<Utc>,
}

impl AllocationLogEntry {
    /// Starts a new entry for `action` on `port_id`.
    #[must_use]
    pub fn new(
        action: AllocationAction,
        port_id: PortId,
        principal: Principal,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: LogEntryId::new(),
            action,
            port_id: Some(port_id),
            customer_id: None,
            subscription_id: None,
            plan_id: None,
            performed_by: principal.admin_id(),
            notes: None,
            created_at: clock.utc(),
        }
    }

    /// Reconstructs an entry from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedLogEntryData) -> Self {
        Self {
            id: data.id,
            action: data.action,
            port_id: data.port_id,
            customer_id: data.customer_id,
            subscription_id: data.subscription_id,
            plan_id: data.plan_id,
            performed_by: data.performed_by,
            notes: data.notes,
            created_at: data.created_at,
        }
    }

    /// Records the subscription, customer and plan involved.
    #[must_use]
    pub const fn with_subscription(mut self, subscription: &SubscriptionSummary) -> Self {
        self.subscription_id = Some(subscription.id());
        self.customer_id = subscription.customer_id();
        self.plan_id = subscription.plan_id();
        self
    }

    /// Attaches a free-text justification. Blank notes are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::FieldTooLong`] when the notes exceed 2000
    /// characters.
    pub fn with_notes(mut self, notes: Option<String>) -> Result<Self, PortDomainError> {
        self.notes = normalize_optional(notes, "notes", LOG_NOTES_LIMIT)?;
        Ok(self)
    }

    /// Returns the entry identifier.
    #[must_use]
    pub const fn id(&self) -> LogEntryId {
        self.id
    }

    /// Returns the recorded action.
    #[must_use]
    pub const fn action(&self) -> AllocationAction {
        self.action
    }

    /// Returns the port reference.
    #[must_use]
    pub const fn port_id(&self) -> Option<PortId> {
        self.port_id
    }

    /// Returns the customer reference.
    #[must_use]
    pub const fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    /// Returns the subscription reference.
    #[must_use]
    pub const fn subscription_id(&self) -> Option<SubscriptionId> {
        self.subscription_id
    }

    /// Returns the plan reference.
    #[must_use]
    pub const fn plan_id(&self) -> Option<PlanId> {
        self.plan_id
    }

    /// Returns the administrator who acted, or `None` for system actions.
    #[must_use]
    pub const fn performed_by(&self) -> Option<AdminUserId> {
        self.performed_by
    }

    /// Returns the acting principal.
    #[must_use]
    pub const fn principal(&self) -> Principal {
        Principal::from_performed_by(self.performed_by)
    }

    /// Returns the notes, if any.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Returns when the entry was recorded.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
