//! Read-only port onto subscription, customer and plan records owned by
//! other subsystems.

use crate::allocation::domain::{CustomerId, PlanId, SubscriptionId, SubscriptionSummary};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Result type for subscription directory lookups.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Lookup contract for records referenced by allocation log entries.
///
/// Missing records are reported as absent, never as errors: callers render
/// them as deleted placeholders.
#[async_trait]
pub trait SubscriptionDirectory: Send + Sync {
    /// Finds a subscription with its customer and plan.
    async fn find_subscription(
        &self,
        id: SubscriptionId,
    ) -> DirectoryResult<Option<SubscriptionSummary>>;

    /// Returns display names for the customers that still exist among
    /// `ids`.
    async fn customer_names(
        &self,
        ids: &[CustomerId],
    ) -> DirectoryResult<HashMap<CustomerId, String>>;

    /// Returns display names for the plans that still exist among `ids`.
    async fn plan_names(&self, ids: &[PlanId]) -> DirectoryResult<HashMap<PlanId, String>>;
}

/// Errors returned by subscription directory implementations.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    /// Persistence-layer failure.
    #[error("directory lookup failed: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl DirectoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
