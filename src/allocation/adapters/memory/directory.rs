//! In-memory subscription directory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::allocation::{
    domain::{CustomerId, PlanId, SubscriptionId, SubscriptionSummary},
    ports::{DirectoryError, DirectoryResult, SubscriptionDirectory},
};

/// Thread-safe in-memory stand-in for the subscription, customer and plan
/// tables owned by other subsystems.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    subscriptions: HashMap<SubscriptionId, SubscriptionSummary>,
    customers: HashMap<CustomerId, String>,
    plans: HashMap<PlanId, String>,
}

impl InMemorySubscriptionDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Persistence`] when the lock is poisoned.
    pub fn insert_subscription(&self, subscription: SubscriptionSummary) -> DirectoryResult<()> {
        let mut state = self.write()?;
        state.subscriptions.insert(subscription.id(), subscription);
        Ok(())
    }

    /// Adds or replaces a customer display name.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Persistence`] when the lock is poisoned.
    pub fn insert_customer(&self, id: CustomerId, name: impl Into<String>) -> DirectoryResult<()> {
        let mut state = self.write()?;
        state.customers.insert(id, name.into());
        Ok(())
    }

    /// Adds or replaces a plan display name.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Persistence`] when the lock is poisoned.
    pub fn insert_plan(&self, id: PlanId, name: impl Into<String>) -> DirectoryResult<()> {
        let mut state = self.write()?;
        state.plans.insert(id, name.into());
        Ok(())
    }

    /// Removes a customer, as the customer subsystem would on deletion.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Persistence`] when the lock is poisoned.
    pub fn remove_customer(&self, id: CustomerId) -> DirectoryResult<()> {
        let mut state = self.write()?;
        state.customers.remove(&id);
        Ok(())
    }

    fn write(&self) -> DirectoryResult<std::sync::RwLockWriteGuard<'_, DirectoryState>> {
        self.state
            .write()
            .map_err(|err| DirectoryError::persistence(std::io::Error::other(err.to_string())))
    }

    fn read(&self) -> DirectoryResult<std::sync::RwLockReadGuard<'_, DirectoryState>> {
        self.state
            .read()
            .map_err(|err| DirectoryError::persistence(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl SubscriptionDirectory for InMemorySubscriptionDirectory {
    async fn find_subscription(
        &self,
        id: SubscriptionId,
    ) -> DirectoryResult<Option<SubscriptionSummary>> {
        let state = self.read()?;
        Ok(state.subscriptions.get(&id).copied())
    }

    async fn customer_names(
        &self,
        ids: &[CustomerId],
    ) -> DirectoryResult<HashMap<CustomerId, String>> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.customers.get(id).map(|name| (*id, name.clone())))
            .collect())
    }

    async fn plan_names(&self, ids: &[PlanId]) -> DirectoryResult<HashMap<PlanId, String>> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.plans.get(id).map(|name| (*id, name.clone())))
            .collect())
    }
}
