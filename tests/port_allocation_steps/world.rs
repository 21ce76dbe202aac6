//! Shared world state for port allocation BDD scenarios.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use karyalay_ports::allocation::{
    adapters::memory::{InMemoryPortStore, InMemorySubscriptionDirectory},
    domain::{
        AdminUserId, AllocationLogEntry, LogFilter, PageRequest, Port, PortId, Principal,
        SubscriptionId,
    },
    services::{
        AllocationLogService, PortAllocationService, PortRegistryService, PortServiceError,
    },
};
use mockable::Clock;
use rstest::fixture;

/// Clock that moves one second forward every time it is read, so each
/// recorded event has a distinct timestamp.
#[derive(Debug)]
pub struct TickingClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for TickingClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.timestamp_opt(1_714_550_400, 0).single().unwrap_or_default()),
        }
    }
}

impl Clock for TickingClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        let current = *now;
        *now += Duration::seconds(1);
        current
    }
}

/// Allocation service type used by the BDD world.
pub type TestAllocation =
    PortAllocationService<InMemoryPortStore, InMemorySubscriptionDirectory, TickingClock>;

/// Scenario world for port allocation behaviour tests.
pub struct AllocationWorld {
    pub directory: Arc<InMemorySubscriptionDirectory>,
    pub registry: PortRegistryService<InMemoryPortStore, TickingClock>,
    pub allocation: TestAllocation,
    pub log: AllocationLogService<InMemoryPortStore, InMemorySubscriptionDirectory>,
    pub admin: Principal,
    pub ports: HashMap<String, PortId>,
    pub subscriptions: HashMap<String, SubscriptionId>,
    pub entries_before: u64,
    pub last_result: Option<Result<Port, PortServiceError>>,
}

impl AllocationWorld {
    /// Creates a world with an empty pool.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryPortStore::new());
        let directory = Arc::new(InMemorySubscriptionDirectory::new());
        let clock = Arc::new(TickingClock::default());
        Self {
            registry: PortRegistryService::new(Arc::clone(&store), Arc::clone(&clock)),
            allocation: PortAllocationService::new(
                Arc::clone(&store),
                Arc::clone(&directory),
                clock,
            ),
            log: AllocationLogService::new(store, Arc::clone(&directory)),
            directory,
            admin: Principal::Admin(AdminUserId::new()),
            ports: HashMap::new(),
            subscriptions: HashMap::new(),
            entries_before: 0,
            last_result: None,
        }
    }

    /// Looks up a port created earlier in the scenario.
    ///
    /// # Errors
    ///
    /// Returns an error when no port was registered under `label`.
    pub fn port_id(&self, label: &str) -> Result<PortId, eyre::Report> {
        self.ports
            .get(label)
            .copied()
            .ok_or_else(|| eyre::eyre!("no port named {label} in scenario world"))
    }

    /// Looks up a subscription created earlier in the scenario.
    ///
    /// # Errors
    ///
    /// Returns an error when no subscription was registered under `label`.
    pub fn subscription_id(&self, label: &str) -> Result<SubscriptionId, eyre::Report> {
        self.subscriptions
            .get(label)
            .copied()
            .ok_or_else(|| eyre::eyre!("no subscription named {label} in scenario world"))
    }

    /// Returns log entries matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error when the log query fails.
    pub fn entries(&self, filter: &LogFilter) -> Result<Vec<AllocationLogEntry>, eyre::Report> {
        let page = run_async(self.log.query(filter, PageRequest::new(1, 100)?))?;
        Ok(page.into_items().into_iter().map(|view| view.entry).collect())
    }

    /// Records the current log size before an action under test.
    ///
    /// # Errors
    ///
    /// Returns an error when the log query fails.
    pub fn mark_log(&mut self) -> Result<(), eyre::Report> {
        let page = run_async(self.log.query(&LogFilter::new(), PageRequest::default()))?;
        self.entries_before = page.total();
        Ok(())
    }
}

impl Default for AllocationWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> AllocationWorld {
    AllocationWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
