//! Store port for the port pool and its allocation log.

use crate::allocation::domain::{
    AllocationAction, AllocationLogEntry, InstanceUrl, LogEntryId, LogFilter, Page, PageRequest,
    Port, PortFilter, PortId, PortTransition, StatusCounts, SubscriptionId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Result type for port store operations.
pub type PortStoreResult<T> = Result<T, PortStoreError>;

/// Persistence contract for ports and allocation log entries.
///
/// The two collections live behind one trait because every state change
/// must be written together with its log entry.
#[async_trait]
pub trait PortStore: Send + Sync {
    /// Stores a new port together with its `CREATED` entry.
    ///
    /// # Errors
    ///
    /// Returns [`PortStoreError::DuplicatePort`] when the identifier exists,
    /// [`PortStoreError::DuplicateInstanceUrl`] when another port already
    /// uses the URL, or [`PortStoreError::DuplicateLogEntry`] when the entry
    /// identifier exists. Nothing is written on error.
    async fn insert_port(&self, port: &Port, entry: &AllocationLogEntry) -> PortStoreResult<()>;

    /// Applies a lifecycle transition and appends its log entry atomically.
    ///
    /// # Errors
    ///
    /// Returns [`PortStoreError::NotFound`] when the port is gone,
    /// [`PortStoreError::StaleVersion`] when another writer committed first,
    /// [`PortStoreError::SubscriptionAlreadyAssigned`] when the subscription
    /// already holds another port, or [`PortStoreError::DuplicateLogEntry`]
    /// when the entry cannot be appended. Nothing is written on error.
    async fn commit_transition(&self, transition: &PortTransition) -> PortStoreResult<()>;

    /// Persists edited descriptive fields without a log entry.
    ///
    /// # Errors
    ///
    /// Returns [`PortStoreError::NotFound`],
    /// [`PortStoreError::StaleVersion`] or
    /// [`PortStoreError::DuplicateInstanceUrl`].
    async fn update_port(&self, port: &Port, expected_version: u64) -> PortStoreResult<()>;

    /// Removes a port. Log entries keep referencing its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PortStoreError::NotFound`] or
    /// [`PortStoreError::StaleVersion`].
    async fn delete_port(&self, id: PortId, expected_version: u64) -> PortStoreResult<()>;

    /// Finds a port by identifier.
    async fn find_port(&self, id: PortId) -> PortStoreResult<Option<Port>>;

    /// Finds the port currently assigned to a subscription.
    async fn find_by_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> PortStoreResult<Option<Port>>;

    /// Returns the ports that still exist among `ids`, in no particular
    /// order.
    async fn find_ports(&self, ids: &[PortId]) -> PortStoreResult<Vec<Port>>;

    /// Lists ports matching `filter`, newest first.
    async fn list_ports(&self, filter: &PortFilter, page: PageRequest)
    -> PortStoreResult<Page<Port>>;

    /// Returns up to `limit` available ports, oldest first, optionally
    /// restricted to one server region.
    async fn available_ports(&self, region: Option<String>, limit: u64)
    -> PortStoreResult<Vec<Port>>;

    /// Counts ports per status.
    async fn status_counts(&self) -> PortStoreResult<StatusCounts>;

    /// Queries log entries matching `filter`, newest first.
    async fn query_log(
        &self,
        filter: &LogFilter,
        page: PageRequest,
    ) -> PortStoreResult<Page<AllocationLogEntry>>;

    /// Returns the actions that occur in stored entries.
    async fn distinct_actions(&self) -> PortStoreResult<BTreeSet<AllocationAction>>;

    /// Deletes entries recorded before `cutoff`, returning how many were
    /// removed.
    async fn purge_log_before(&self, cutoff: DateTime<Utc>) -> PortStoreResult<u64>;
}

/// Errors returned by port store implementations.
#[derive(Debug, Clone, Error)]
pub enum PortStoreError {
    /// A port with the same identifier already exists.
    #[error("duplicate port identifier: {0}")]
    DuplicatePort(PortId),

    /// Another port already uses the instance URL.
    #[error("duplicate instance URL: {0}")]
    DuplicateInstanceUrl(InstanceUrl),

    /// A log entry with the same identifier already exists.
    #[error("duplicate allocation log entry: {0}")]
    DuplicateLogEntry(LogEntryId),

    /// The port was not found.
    #[error("port not found: {0}")]
    NotFound(PortId),

    /// The port changed since it was loaded.
    #[error("port {port_id} was modified concurrently (expected version {expected})")]
    StaleVersion {
        /// Port whose write was rejected.
        port_id: PortId,
        /// Version the writer expected.
        expected: u64,
    },

    /// The subscription already holds another port.
    #[error("subscription {0} already holds a port")]
    SubscriptionAlreadyAssigned(SubscriptionId),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl PortStoreError {
    /// Wraps a data-quality or deserialization error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns whether the error reports a lost race or a uniqueness clash
    /// rather than an infrastructure failure.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DuplicatePort(_)
                | Self::DuplicateInstanceUrl(_)
                | Self::DuplicateLogEntry(_)
                | Self::StaleVersion { .. }
                | Self::SubscriptionAlreadyAssigned(_)
        )
    }
}
