//! In-memory port store for tests and embedded callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::allocation::{
    domain::{
        AllocationAction, AllocationLogEntry, InstanceUrl, LogEntryId, LogFilter, Page,
        PageRequest, Port, PortFilter, PortId, PortStatus, PortTransition, StatusCounts,
        SubscriptionId,
    },
    ports::{PortStore, PortStoreError, PortStoreResult},
};

/// Thread-safe in-memory port store.
///
/// All validation for a write happens before any collection is touched, so
/// a rejected write leaves the store unchanged.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPortStore {
    state: Arc<RwLock<InMemoryStoreState>>,
}

#[derive(Debug, Default)]
struct InMemoryStoreState {
    ports: HashMap<PortId, Port>,
    url_index: HashMap<InstanceUrl, PortId>,
    subscription_index: HashMap<SubscriptionId, PortId>,
    log: Vec<AllocationLogEntry>,
    log_ids: HashSet<LogEntryId>,
}

impl InMemoryPortStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> PortStoreResult<RwLockReadGuard<'_, InMemoryStoreState>> {
        self.state
            .read()
            .map_err(|err| PortStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> PortStoreResult<RwLockWriteGuard<'_, InMemoryStoreState>> {
        self.state
            .write()
            .map_err(|err| PortStoreError::persistence(std::io::Error::other(err.to_string())))
    }
}

impl InMemoryStoreState {
    fn current(&self, id: PortId, expected_version: u64) -> PortStoreResult<&Port> {
        let current = self.ports.get(&id).ok_or(PortStoreError::NotFound(id))?;
        if current.version() != expected_version {
            return Err(PortStoreError::StaleVersion {
                port_id: id,
                expected: expected_version,
            });
        }
        Ok(current)
    }

    fn ensure_url_free(&self, port: &Port) -> PortStoreResult<()> {
        let url = port.details().instance_url();
        match self.url_index.get(url) {
            Some(owner) if *owner != port.id() => {
                Err(PortStoreError::DuplicateInstanceUrl(url.clone()))
            }
            _ => Ok(()),
        }
    }

    fn ensure_subscription_free(&self, port: &Port) -> PortStoreResult<()> {
        let Some(subscription_id) = port.assigned_subscription_id() else {
            return Ok(());
        };
        match self.subscription_index.get(&subscription_id) {
            Some(holder) if *holder != port.id() => Err(
                PortStoreError::SubscriptionAlreadyAssigned(subscription_id),
            ),
            _ => Ok(()),
        }
    }

    fn ensure_entry_new(&self, entry: &AllocationLogEntry) -> PortStoreResult<()> {
        if self.log_ids.contains(&entry.id()) {
            return Err(PortStoreError::DuplicateLogEntry(entry.id()));
        }
        Ok(())
    }

    fn put_port(&mut self, port: &Port) {
        if let Some(previous) = self.ports.get(&port.id()) {
            let old_url = previous.details().instance_url().clone();
            let old_subscription = previous.assigned_subscription_id();
            self.url_index.remove(&old_url);
            if let Some(subscription_id) = old_subscription {
                self.subscription_index.remove(&subscription_id);
            }
        }
        self.url_index
            .insert(port.details().instance_url().clone(), port.id());
        if let Some(subscription_id) = port.assigned_subscription_id() {
            self.subscription_index.insert(subscription_id, port.id());
        }
        self.ports.insert(port.id(), port.clone());
    }

    fn append(&mut self, entry: &AllocationLogEntry) {
        self.log_ids.insert(entry.id());
        self.log.push(entry.clone());
    }
}

#[async_trait]
impl PortStore for InMemoryPortStore {
    async fn insert_port(&self, port: &Port, entry: &AllocationLogEntry) -> PortStoreResult<()> {
        let mut state = self.write()?;

        if state.ports.contains_key(&port.id()) {
            return Err(PortStoreError::DuplicatePort(port.id()));
        }
        state.ensure_url_free(port)?;
        state.ensure_subscription_free(port)?;
        state.ensure_entry_new(entry)?;

        state.put_port(port);
        state.append(entry);
        Ok(())
    }

    async fn commit_transition(&self, transition: &PortTransition) -> PortStoreResult<()> {
        let mut state = self.write()?;
        let port = transition.port();

        state.current(port.id(), transition.expected_version())?;
        state.ensure_subscription_free(port)?;
        state.ensure_entry_new(transition.entry())?;

        state.put_port(port);
        state.append(transition.entry());
        Ok(())
    }

    async fn update_port(&self, port: &Port, expected_version: u64) -> PortStoreResult<()> {
        let mut state = self.write()?;

        state.current(port.id(), expected_version)?;
        state.ensure_url_free(port)?;
        state.ensure_subscription_free(port)?;

        state.put_port(port);
        Ok(())
    }

    async fn delete_port(&self, id: PortId, expected_version: u64) -> PortStoreResult<()> {
        let mut state = self.write()?;

        let current = state.current(id, expected_version)?;
        let url = current.details().instance_url().clone();
        let subscription = current.assigned_subscription_id();

        state.url_index.remove(&url);
        if let Some(subscription_id) = subscription {
            state.subscription_index.remove(&subscription_id);
        }
        state.ports.remove(&id);
        Ok(())
    }

    async fn find_port(&self, id: PortId) -> PortStoreResult<Option<Port>> {
        let state = self.read()?;
        Ok(state.ports.get(&id).cloned())
    }

    async fn find_by_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> PortStoreResult<Option<Port>> {
        let state = self.read()?;
        let port = state
            .subscription_index
            .get(&subscription_id)
            .and_then(|id| state.ports.get(id))
            .cloned();
        Ok(port)
    }

    async fn find_ports(&self, ids: &[PortId]) -> PortStoreResult<Vec<Port>> {
        let state = self.read()?;
        let found = ids
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|id| state.ports.get(id))
            .cloned()
            .collect();
        Ok(found)
    }

    async fn list_ports(
        &self,
        filter: &PortFilter,
        page: PageRequest,
    ) -> PortStoreResult<Page<Port>> {
        let state = self.read()?;
        let mut matching: Vec<Port> = state
            .ports
            .values()
            .filter(|port| filter.matches(port))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(page.slice(matching))
    }

    async fn available_ports(
        &self,
        region: Option<String>,
        limit: u64,
    ) -> PortStoreResult<Vec<Port>> {
        let state = self.read()?;
        let wanted_region = region.map(|value| value.trim().to_lowercase());
        let mut candidates: Vec<Port> = state
            .ports
            .values()
            .filter(|port| port.status() == PortStatus::Available)
            .filter(|port| {
                wanted_region.as_deref().is_none_or(|wanted| {
                    port.details()
                        .server_region()
                        .is_some_and(|region_name| region_name.to_lowercase() == wanted)
                })
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        candidates.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(candidates)
    }

    async fn status_counts(&self) -> PortStoreResult<StatusCounts> {
        let state = self.read()?;
        let mut counts = StatusCounts::default();
        for port in state.ports.values() {
            counts.add(port.status(), 1);
        }
        Ok(counts)
    }

    async fn query_log(
        &self,
        filter: &LogFilter,
        page: PageRequest,
    ) -> PortStoreResult<Page<AllocationLogEntry>> {
        let state = self.read()?;
        let mut matching: Vec<AllocationLogEntry> = state
            .log
            .iter()
            .rev()
            .filter(|entry| {
                let port_url = entry
                    .port_id()
                    .and_then(|id| state.ports.get(&id))
                    .map(|port| port.details().instance_url().as_str());
                filter.matches(entry, port_url)
            })
            .cloned()
            .collect();
        // Stable sort keeps the newest-inserted entry first on equal
        // timestamps.
        matching.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(page.slice(matching))
    }

    async fn distinct_actions(&self) -> PortStoreResult<BTreeSet<AllocationAction>> {
        let state = self.read()?;
        Ok(state.log.iter().map(AllocationLogEntry::action).collect())
    }

    async fn purge_log_before(&self, cutoff: DateTime<Utc>) -> PortStoreResult<u64> {
        let mut state = self.write()?;
        let (purged, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.log)
            .into_iter()
            .partition(|entry| entry.created_at() < cutoff);
        for entry in &purged {
            state.log_ids.remove(&entry.id());
        }
        state.log = kept;
        Ok(u64::try_from(purged.len()).unwrap_or(u64::MAX))
    }
}
