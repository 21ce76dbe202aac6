//! Shared fixtures for `PostgreSQL` integration tests.

pub use super::cluster::{PostgresCluster, postgres_cluster};
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_types::{BigInt, Text, Uuid as SqlUuid};
use karyalay_ports::allocation::{
    adapters::postgres::{AllocationPgPool, PostgresPortStore, PostgresSubscriptionDirectory},
    domain::{
        AdminUserId, CustomerId, PlanId, Port, PortId, Principal, SubscriptionId,
        SubscriptionSummary,
    },
    services::{
        AllocationLogService, PortAllocationService, PortDetailsRequest, PortRegistryService,
    },
};
use mockable::Clock;
use rstest::fixture;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::{Builder, Runtime};

/// Error type for harness setup.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Creates the `ports` table and its indexes.
pub const CREATE_PORTS_SQL: &str =
    include_str!("../../migrations/2026-10-19-000000_create_ports/up.sql");

/// Creates the `port_allocation_logs` table.
pub const CREATE_LOGS_SQL: &str =
    include_str!("../../migrations/2026-10-19-000001_create_port_allocation_logs/up.sql");

/// Stand-ins for the billing tables the subscription directory reads. The
/// billing subsystem owns them in a real deployment.
pub const BILLING_TABLES_SQL: &str = "
    CREATE TABLE customers (id UUID PRIMARY KEY, name VARCHAR(255) NOT NULL);
    CREATE TABLE plans (id UUID PRIMARY KEY, name VARCHAR(255) NOT NULL);
    CREATE TABLE subscriptions (id UUID PRIMARY KEY, customer_id UUID, plan_id UUID);
";

/// Template database holding the migrated schema.
pub const TEMPLATE_DB: &str = "karyalay_ports_test_template";

/// Registry service over the `PostgreSQL` store.
pub type PgRegistry = PortRegistryService<PostgresPortStore, TestClock>;

/// Allocation service over the `PostgreSQL` adapters.
pub type PgAllocation =
    PortAllocationService<PostgresPortStore, PostgresSubscriptionDirectory, TestClock>;

/// Log service over the `PostgreSQL` adapters.
pub type PgLog = AllocationLogService<PostgresPortStore, PostgresSubscriptionDirectory>;

/// Builds the runtime tests drive async store calls on.
///
/// # Errors
///
/// Returns an error when the runtime cannot be built.
pub fn test_runtime() -> Result<Runtime, BoxError> {
    Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .map_err(|err| Box::new(err) as BoxError)
}

/// Clock the tests can move. Timestamps stay on whole seconds so they
/// survive the round trip through `TIMESTAMPTZ` unchanged.
#[derive(Debug)]
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    /// Starts the clock at midnight UTC plus `hour` hours on the given day.
    ///
    /// # Panics
    ///
    /// Panics when the date is invalid.
    pub fn at(year: i32, month: u32, day: u32, hour: u32) -> Self {
        let start = Utc
            .with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
            .expect("valid test timestamp");
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jumps to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Clock for TestClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Migrates the template database once per cluster.
///
/// # Errors
///
/// Returns an error if template creation or migration fails.
pub fn ensure_template(cluster: PostgresCluster) -> Result<(), BoxError> {
    cluster.ensure_template(TEMPLATE_DB, |url| {
        let mut connection =
            PgConnection::establish(url).map_err(|err| Box::new(err) as BoxError)?;
        for sql in [CREATE_PORTS_SQL, CREATE_LOGS_SQL, BILLING_TABLES_SQL] {
            connection
                .batch_execute(sql)
                .map_err(|err| Box::new(err) as BoxError)?;
        }
        Ok(())
    })
}

/// A database cloned from the template, dropped with the value.
pub struct TestDatabase {
    cluster: PostgresCluster,
    name: String,
}

impl TestDatabase {
    /// Clones the migrated template into a uniquely named database.
    ///
    /// # Errors
    ///
    /// Returns an error if the template or the clone cannot be created.
    pub fn create(cluster: PostgresCluster) -> Result<Self, BoxError> {
        ensure_template(cluster)?;
        let name = format!("ports_test_{}", uuid::Uuid::new_v4().simple());
        cluster.create_database_from_template(&name, TEMPLATE_DB)?;
        Ok(Self { cluster, name })
    }

    /// Opens a direct connection for seeding and inspection.
    ///
    /// # Panics
    ///
    /// Panics when the database is unreachable.
    pub fn connect(&self) -> PgConnection {
        PgConnection::establish(&self.cluster.database_url(&self.name))
            .expect("test database should accept connections")
    }

    /// Builds a connection pool for the adapters.
    ///
    /// # Errors
    ///
    /// Returns an error when the pool cannot open its connections.
    pub fn pool(&self, max_size: u32) -> Result<AllocationPgPool, BoxError> {
        let manager = ConnectionManager::<PgConnection>::new(self.cluster.database_url(&self.name));
        Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(|err| Box::new(err) as BoxError)
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        drop(self.cluster.drop_database(&self.name));
    }
}

#[derive(QueryableByName)]
struct Count {
    #[diesel(sql_type = BigInt)]
    total: i64,
}

/// Store, services and a clock wired over one scratch database.
pub struct Harness {
    /// Runtime for driving async calls from synchronous tests.
    pub runtime: Runtime,
    /// Clock shared by every service.
    pub clock: Arc<TestClock>,
    /// Store shared by every service.
    pub store: Arc<PostgresPortStore>,
    /// Registry service.
    pub registry: PgRegistry,
    /// Allocation service, shareable across spawned tasks.
    pub allocation: Arc<PgAllocation>,
    /// Log service.
    pub log: PgLog,
    /// Administrator performing the test actions.
    pub admin: Principal,
    database: TestDatabase,
}

impl Harness {
    /// Wires the services over a fresh database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database, pool or runtime cannot be set up.
    pub fn new(cluster: PostgresCluster, pool_size: u32) -> Result<Self, BoxError> {
        let database = TestDatabase::create(cluster)?;
        let pool = database.pool(pool_size)?;
        let store = Arc::new(PostgresPortStore::new(pool.clone()));
        let directory = Arc::new(PostgresSubscriptionDirectory::new(pool));
        let clock = Arc::new(TestClock::at(2024, 5, 1, 9));
        Ok(Self {
            runtime: test_runtime()?,
            registry: PortRegistryService::new(Arc::clone(&store), Arc::clone(&clock)),
            allocation: Arc::new(PortAllocationService::new(
                Arc::clone(&store),
                Arc::clone(&directory),
                Arc::clone(&clock),
            )),
            log: AllocationLogService::new(Arc::clone(&store), directory),
            clock,
            store,
            admin: Principal::Admin(AdminUserId::new()),
            database,
        })
    }

    /// Runs `future` to completion on the harness runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Creates an available port through the registry.
    ///
    /// # Panics
    ///
    /// Panics when the registry refuses the port.
    pub fn port(&self, url: &str) -> Port {
        self.block_on(
            self.registry
                .create(PortDetailsRequest::new(url), self.admin),
        )
        .expect("port creation should succeed")
    }

    /// Seeds a subscription with a named customer and plan.
    ///
    /// # Panics
    ///
    /// Panics when the seed rows cannot be written.
    pub fn subscription(&self, customer: &str, plan: &str) -> SubscriptionSummary {
        let customer_id = CustomerId::new();
        let plan_id = PlanId::new();
        let summary =
            SubscriptionSummary::new(SubscriptionId::new(), Some(customer_id), Some(plan_id));
        let mut connection = self.database.connect();
        diesel::sql_query("INSERT INTO customers (id, name) VALUES ($1, $2)")
            .bind::<SqlUuid, _>(customer_id.into_inner())
            .bind::<Text, _>(customer)
            .execute(&mut connection)
            .expect("customer insert should succeed");
        diesel::sql_query("INSERT INTO plans (id, name) VALUES ($1, $2)")
            .bind::<SqlUuid, _>(plan_id.into_inner())
            .bind::<Text, _>(plan)
            .execute(&mut connection)
            .expect("plan insert should succeed");
        diesel::sql_query("INSERT INTO subscriptions (id, customer_id, plan_id) VALUES ($1, $2, $3)")
            .bind::<SqlUuid, _>(summary.id().into_inner())
            .bind::<SqlUuid, _>(customer_id.into_inner())
            .bind::<SqlUuid, _>(plan_id.into_inner())
            .execute(&mut connection)
            .expect("subscription insert should succeed");
        summary
    }

    /// Counts the stored log rows that reference `port_id`.
    ///
    /// # Panics
    ///
    /// Panics when the count query fails.
    pub fn log_rows(&self, port_id: PortId) -> i64 {
        diesel::sql_query("SELECT COUNT(*) AS total FROM port_allocation_logs WHERE port_id = $1")
            .bind::<SqlUuid, _>(port_id.into_inner())
            .get_result::<Count>(&mut self.database.connect())
            .expect("log count should succeed")
            .total
    }
}

/// Provides services over a fresh database on the shared cluster.
#[fixture]
pub fn harness(postgres_cluster: PostgresCluster) -> Harness {
    Harness::new(postgres_cluster, 4).expect("PostgreSQL harness setup")
}
