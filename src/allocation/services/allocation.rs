//! Port lifecycle transitions against subscriptions.

use super::error::{PortServiceError, PortServiceResult};
use crate::allocation::{
    domain::{
        AllocationAction, AllocationLogEntry, Port, PortDomainError, PortId, PortTransition,
        Principal, SubscriptionId, SubscriptionSummary,
    },
    ports::{PortStore, SubscriptionDirectory},
};
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of candidates `allocate` tries before giving up.
pub const DEFAULT_ALLOCATION_ATTEMPTS: u32 = 3;

/// Constraints applied when picking a port automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationPreference {
    region: Option<String>,
}

impl AllocationPreference {
    /// Accepts any available port.
    #[must_use]
    pub const fn any() -> Self {
        Self { region: None }
    }

    /// Restricts candidates to a hosting region (case-insensitive).
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Returns the requested region.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

/// Moves ports through their lifecycle, writing one log entry per
/// transition.
///
/// Every mutation loads the port, applies the domain transition to a copy
/// and commits it with the version it was loaded at. A concurrent writer
/// makes the commit fail with a conflict and nothing is written.
#[derive(Clone)]
pub struct PortAllocationService<S, D, C>
where
    S: PortStore,
    D: SubscriptionDirectory,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    directory: Arc<D>,
    clock: Arc<C>,
    allocation_attempts: u32,
}

impl<S, D, C> PortAllocationService<S, D, C>
where
    S: PortStore,
    D: SubscriptionDirectory,
    C: Clock + Send + Sync,
{
    /// Creates an allocation service.
    #[must_use]
    pub const fn new(store: Arc<S>, directory: Arc<D>, clock: Arc<C>) -> Self {
        Self {
            store,
            directory,
            clock,
            allocation_attempts: DEFAULT_ALLOCATION_ATTEMPTS,
        }
    }

    /// Sets how many candidates `allocate` tries. Zero is treated as one.
    #[must_use]
    pub const fn with_allocation_attempts(mut self, attempts: u32) -> Self {
        self.allocation_attempts = if attempts == 0 { 1 } else { attempts };
        self
    }

    /// Binds a specific port to a subscription.
    ///
    /// Records `REASSIGNED` when the port last served a different
    /// subscription, `ASSIGNED` otherwise.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for an unknown port or subscription, and a
    /// conflict when the port is not assignable, the subscription already
    /// holds another port, or a concurrent writer got there first.
    pub async fn assign(
        &self,
        port_id: PortId,
        subscription_id: SubscriptionId,
        principal: Principal,
        notes: Option<String>,
    ) -> PortServiceResult<Port> {
        let port = self.load(port_id).await?;
        let subscription = self.subscription(subscription_id).await?;
        self.ensure_subscription_free(subscription_id, Some(port_id))
            .await?;
        self.assign_loaded(port, &subscription, principal, notes)
            .await
    }

    /// Picks the oldest available port and binds it to a subscription.
    ///
    /// Each attempt reads a fresh batch of candidates and tries them oldest
    /// first. A batch lost entirely to concurrent writers triggers another
    /// read, up to the configured number of attempts.
    ///
    /// # Errors
    ///
    /// Returns [`PortServiceError::PoolExhausted`] when no available port
    /// matches, [`PortServiceError::AllocationContended`] when every
    /// candidate read within the attempt budget was claimed concurrently,
    /// plus the errors of [`Self::assign`].
    pub async fn allocate(
        &self,
        subscription_id: SubscriptionId,
        principal: Principal,
        preference: AllocationPreference,
    ) -> PortServiceResult<Port> {
        let subscription = self.subscription(subscription_id).await?;
        self.ensure_subscription_free(subscription_id, None).await?;
        let region = preference.region;

        for attempt in 1..=self.allocation_attempts {
            let candidates = self
                .store
                .available_ports(region.clone(), u64::from(self.allocation_attempts))
                .await?;
            if candidates.is_empty() {
                warn!(
                    subscription_id = %subscription_id,
                    region = ?region,
                    "port pool exhausted"
                );
                return Err(PortServiceError::PoolExhausted { region });
            }
            if let Some(port) = self
                .claim_first(candidates, &subscription, principal)
                .await?
            {
                return Ok(port);
            }
            debug!(
                subscription_id = %subscription_id,
                attempt,
                "every candidate claimed concurrently, re-reading pool"
            );
        }

        warn!(
            subscription_id = %subscription_id,
            attempts = self.allocation_attempts,
            "allocation gave up under contention"
        );
        Err(PortServiceError::AllocationContended {
            subscription_id,
            attempts: self.allocation_attempts,
        })
    }

    /// Returns an assigned port to the pool on an administrator's request.
    ///
    /// # Errors
    ///
    /// Returns [`PortServiceError::PortNotFound`], or a conflict when the
    /// port is not assigned or changed concurrently.
    pub async fn release(
        &self,
        port_id: PortId,
        principal: Principal,
        notes: Option<String>,
    ) -> PortServiceResult<Port> {
        let port = self.load(port_id).await?;
        self.release_loaded(port, AllocationAction::Released, principal, notes)
            .await
    }

    /// Releases whatever port a subscription holds, as the provisioning
    /// workflow does when a subscription ends.
    ///
    /// Returns `Ok(None)` when the subscription holds no port.
    ///
    /// # Errors
    ///
    /// Returns a conflict when the port changed concurrently, or a
    /// persistence error.
    pub async fn unassign_subscription(
        &self,
        subscription_id: SubscriptionId,
        notes: Option<String>,
    ) -> PortServiceResult<Option<Port>> {
        let Some(port) = self.store.find_by_subscription(subscription_id).await? else {
            debug!(subscription_id = %subscription_id, "subscription holds no port");
            return Ok(None);
        };
        let released = self
            .release_loaded(port, AllocationAction::Unassigned, Principal::System, notes)
            .await?;
        Ok(Some(released))
    }

    /// Holds an available port for a checkout in progress.
    ///
    /// # Errors
    ///
    /// Returns [`PortServiceError::PortNotFound`], or a conflict unless the
    /// port is available.
    pub async fn reserve(
        &self,
        port_id: PortId,
        principal: Principal,
        notes: Option<String>,
    ) -> PortServiceResult<Port> {
        self.apply(port_id, AllocationAction::Reserved, principal, notes, |port, clock| {
            port.reserve(clock)
        })
        .await
    }

    /// Drops a checkout hold.
    ///
    /// # Errors
    ///
    /// Returns [`PortServiceError::PortNotFound`], or a conflict unless the
    /// port is reserved.
    pub async fn make_available(
        &self,
        port_id: PortId,
        principal: Principal,
        notes: Option<String>,
    ) -> PortServiceResult<Port> {
        self.apply(
            port_id,
            AllocationAction::MadeAvailable,
            principal,
            notes,
            |port, clock| port.make_available(clock),
        )
        .await
    }

    /// Takes a port out of service.
    ///
    /// # Errors
    ///
    /// Returns [`PortServiceError::PortNotFound`], or a conflict when the
    /// port is assigned or already disabled.
    pub async fn disable(
        &self,
        port_id: PortId,
        principal: Principal,
        notes: Option<String>,
    ) -> PortServiceResult<Port> {
        self.apply(port_id, AllocationAction::Disabled, principal, notes, |port, clock| {
            port.disable(clock)
        })
        .await
    }

    /// Returns a disabled port to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PortServiceError::PortNotFound`], or a conflict unless the
    /// port is disabled.
    pub async fn enable(
        &self,
        port_id: PortId,
        principal: Principal,
        notes: Option<String>,
    ) -> PortServiceResult<Port> {
        self.apply(port_id, AllocationAction::Enabled, principal, notes, |port, clock| {
            port.enable(clock)
        })
        .await
    }

    /// Returns the port currently assigned to a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`PortServiceError::Store`] when persistence fails.
    pub async fn port_for_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> PortServiceResult<Option<Port>> {
        Ok(self.store.find_by_subscription(subscription_id).await?)
    }

    async fn load(&self, port_id: PortId) -> PortServiceResult<Port> {
        self.store
            .find_port(port_id)
            .await?
            .ok_or(PortServiceError::PortNotFound(port_id))
    }

    async fn subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> PortServiceResult<SubscriptionSummary> {
        self.directory
            .find_subscription(subscription_id)
            .await?
            .ok_or(PortServiceError::SubscriptionNotFound(subscription_id))
    }

    async fn ensure_subscription_free(
        &self,
        subscription_id: SubscriptionId,
        target: Option<PortId>,
    ) -> PortServiceResult<()> {
        match self.store.find_by_subscription(subscription_id).await? {
            Some(held) if Some(held.id()) != target => {
                warn!(
                    subscription_id = %subscription_id,
                    port_id = %held.id(),
                    "subscription already holds a port"
                );
                Err(PortServiceError::SubscriptionHoldsPort {
                    subscription_id,
                    port_id: held.id(),
                })
            }
            _ => Ok(()),
        }
    }

    async fn assign_loaded(
        &self,
        mut port: Port,
        subscription: &SubscriptionSummary,
        principal: Principal,
        notes: Option<String>,
    ) -> PortServiceResult<Port> {
        let expected_version = port.version();
        let action = port
            .assign(subscription.id(), &*self.clock)
            .inspect_err(log_refusal)?;
        let entry = AllocationLogEntry::new(action, port.id(), principal, &*self.clock)
            .with_subscription(subscription)
            .with_notes(notes)?;
        self.commit(PortTransition::new(port, expected_version, entry), principal)
            .await
    }

    /// Tries `candidates` in order, returning `None` when every one was lost
    /// to a concurrent writer.
    async fn claim_first(
        &self,
        candidates: Vec<Port>,
        subscription: &SubscriptionSummary,
        principal: Principal,
    ) -> PortServiceResult<Option<Port>> {
        for candidate in candidates {
            let candidate_id = candidate.id();
            match self
                .assign_loaded(candidate, subscription, principal, None)
                .await
            {
                Ok(port) => return Ok(Some(port)),
                Err(err) if err.is_lost_race() => {
                    warn!(
                        port_id = %candidate_id,
                        subscription_id = %subscription.id(),
                        error = %err,
                        "allocation candidate claimed concurrently, trying next"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    async fn release_loaded(
        &self,
        mut port: Port,
        action: AllocationAction,
        principal: Principal,
        notes: Option<String>,
    ) -> PortServiceResult<Port> {
        let expected_version = port.version();
        let subscription_id = port
            .release(&*self.clock)
            .inspect_err(log_refusal)?;
        // The subscription may already be gone; the entry still names it.
        let subscription = self
            .directory
            .find_subscription(subscription_id)
            .await?
            .unwrap_or_else(|| SubscriptionSummary::orphaned(subscription_id));
        let entry = AllocationLogEntry::new(action, port.id(), principal, &*self.clock)
            .with_subscription(&subscription)
            .with_notes(notes)?;
        self.commit(PortTransition::new(port, expected_version, entry), principal)
            .await
    }

    async fn apply<F>(
        &self,
        port_id: PortId,
        action: AllocationAction,
        principal: Principal,
        notes: Option<String>,
        transition: F,
    ) -> PortServiceResult<Port>
    where
        F: FnOnce(&mut Port, &C) -> Result<(), PortDomainError> + Send,
    {
        let mut port = self.load(port_id).await?;
        let expected_version = port.version();
        transition(&mut port, &*self.clock).inspect_err(log_refusal)?;
        let entry = AllocationLogEntry::new(action, port.id(), principal, &*self.clock)
            .with_notes(notes)?;
        self.commit(PortTransition::new(port, expected_version, entry), principal)
            .await
    }

    async fn commit(
        &self,
        transition: PortTransition,
        principal: Principal,
    ) -> PortServiceResult<Port> {
        if let Err(err) = self.store.commit_transition(&transition).await {
            warn!(
                port_id = %transition.port().id(),
                action = %transition.entry().action(),
                error = %err,
                "port transition rejected"
            );
            return Err(err.into());
        }

        let action = transition.entry().action();
        let port = transition.into_port();
        info!(
            port_id = %port.id(),
            %action,
            status = %port.status(),
            version = port.version(),
            %principal,
            "port transition committed"
        );
        Ok(port)
    }
}

fn log_refusal(err: &PortDomainError) {
    warn!(error = %err, "port transition refused");
}
