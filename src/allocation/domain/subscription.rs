//! Read-only view of an externally owned subscription.

use super::{CustomerId, PlanId, SubscriptionId};
use serde::{Deserialize, Serialize};

/// Subscription facts captured into the allocation log when a port is
/// bound or released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSummary {
    id: SubscriptionId,
    customer_id: Option<CustomerId>,
    plan_id: Option<PlanId>,
}

impl SubscriptionSummary {
    /// Creates a summary for the given subscription.
    #[must_use]
    pub const fn new(
        id: SubscriptionId,
        customer_id: Option<CustomerId>,
        plan_id: Option<PlanId>,
    ) -> Self {
        Self {
            id,
            customer_id,
            plan_id,
        }
    }

    /// Creates a summary carrying only the subscription identifier, used
    /// when the subscription record is no longer available.
    #[must_use]
    pub const fn orphaned(id: SubscriptionId) -> Self {
        Self::new(id, None, None)
    }

    /// Returns the subscription identifier.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the owning customer, if known.
    #[must_use]
    pub const fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    /// Returns the subscribed plan, if known.
    #[must_use]
    pub const fn plan_id(&self) -> Option<PlanId> {
        self.plan_id
    }
}
