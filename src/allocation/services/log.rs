//! Read side of the allocation audit trail.

use super::error::PortServiceResult;
use crate::allocation::{
    domain::{
        AllocationAction, AllocationLogEntry, AllocationLogView, CustomerId, LogFilter, Page,
        PageRequest, PlanId, PortId, PortSummary, ResolvedRef,
    },
    ports::{PortStore, SubscriptionDirectory},
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Queries the allocation log and resolves its weak references for
/// display.
#[derive(Clone)]
pub struct AllocationLogService<S, D>
where
    S: PortStore,
    D: SubscriptionDirectory,
{
    store: Arc<S>,
    directory: Arc<D>,
}

impl<S, D> AllocationLogService<S, D>
where
    S: PortStore,
    D: SubscriptionDirectory,
{
    /// Creates a log service.
    #[must_use]
    pub const fn new(store: Arc<S>, directory: Arc<D>) -> Self {
        Self { store, directory }
    }

    /// Returns matching entries newest first, each joined with the current
    /// port, customer and plan records.
    ///
    /// References to records that no longer exist resolve to
    /// [`ResolvedRef::Deleted`].
    ///
    /// # Errors
    ///
    /// Returns a persistence error when the store or directory fails.
    pub async fn query(
        &self,
        filter: &LogFilter,
        page: PageRequest,
    ) -> PortServiceResult<Page<AllocationLogView>> {
        debug!(?filter, page = page.page(), "querying allocation log");
        let entries = self.store.query_log(filter, page).await?;

        let port_ids = distinct_ids(entries.items(), AllocationLogEntry::port_id);
        let customer_ids = distinct_ids(entries.items(), AllocationLogEntry::customer_id);
        let plan_ids = distinct_ids(entries.items(), AllocationLogEntry::plan_id);

        let ports: HashMap<PortId, PortSummary> = self
            .store
            .find_ports(&port_ids)
            .await?
            .iter()
            .map(|port| (port.id(), PortSummary::from(port)))
            .collect();
        let customers: HashMap<CustomerId, String> =
            self.directory.customer_names(&customer_ids).await?;
        let plans: HashMap<PlanId, String> = self.directory.plan_names(&plan_ids).await?;

        Ok(entries.map(|entry| AllocationLogView {
            port: ResolvedRef::resolve(entry.port_id(), |id| ports.get(&id).cloned()),
            customer: ResolvedRef::resolve(entry.customer_id(), |id| customers.get(&id).cloned()),
            plan: ResolvedRef::resolve(entry.plan_id(), |id| plans.get(&id).cloned()),
            entry,
        }))
    }

    /// Returns the actions present in the stored log.
    ///
    /// [`AllocationAction::ALL`] holds the full vocabulary for callers that
    /// want every option regardless of history.
    ///
    /// # Errors
    ///
    /// Returns a persistence error when the store fails.
    pub async fn distinct_actions(&self) -> PortServiceResult<BTreeSet<AllocationAction>> {
        Ok(self.store.distinct_actions().await?)
    }

    /// Deletes entries recorded before `cutoff` and returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns a persistence error when the store fails.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> PortServiceResult<u64> {
        let purged = self.store.purge_log_before(cutoff).await?;
        info!(%cutoff, purged, "allocation log purged");
        Ok(purged)
    }
}

fn distinct_ids<I: Ord + Copy>(
    entries: &[AllocationLogEntry],
    id_of: impl Fn(&AllocationLogEntry) -> Option<I>,
) -> Vec<I> {
    entries
        .iter()
        .filter_map(id_of)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
