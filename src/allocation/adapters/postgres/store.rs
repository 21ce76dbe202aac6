//! `PostgreSQL` port store.

use super::{
    conversions::{
        contains_pattern, escape_like, row_to_log_entry, row_to_port, to_changeset,
        to_new_log_row, to_new_port_row, version_to_column,
    },
    models::{AllocationLogRow, PortChangeset, PortRow},
    schema::{port_allocation_logs, ports},
};
use crate::allocation::{
    domain::{
        AllocationAction, AllocationLogEntry, LogEntryId, LogFilter, Page, PageRequest, Port,
        PortFilter, PortId, PortStatus, PortTransition, StatusCounts, SubscriptionId,
    },
    ports::{PortStore, PortStoreError, PortStoreResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::BTreeSet;

/// `PostgreSQL` connection pool type used by allocation adapters.
pub type AllocationPgPool = Pool<ConnectionManager<PgConnection>>;

const INSTANCE_URL_INDEX: &str = "idx_ports_instance_url";
const ASSIGNED_SUBSCRIPTION_INDEX: &str = "idx_ports_assigned_subscription";
const LOG_ID_INDEX: &str = "idx_port_allocation_logs_id";

/// `PostgreSQL`-backed port store.
///
/// Transitions are applied with `UPDATE ... WHERE id = $1 AND version = $2`
/// and the log insert runs in the same transaction, so a lost race or a
/// failed log write leaves both tables untouched.
#[derive(Debug, Clone)]
pub struct PostgresPortStore {
    pool: AllocationPgPool,
}

impl PostgresPortStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: AllocationPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> PortStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> PortStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(PortStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(PortStoreError::persistence)?
    }
}

impl From<DieselError> for PortStoreError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

#[async_trait]
impl PortStore for PostgresPortStore {
    async fn insert_port(&self, port: &Port, entry: &AllocationLogEntry) -> PortStoreResult<()> {
        let snapshot = port.clone();
        let new_row = to_new_port_row(port)?;
        let log_row = to_new_log_row(entry);

        self.run_blocking(move |connection| {
            connection.transaction::<_, PortStoreError, _>(|tx| {
                diesel::insert_into(ports::table)
                    .values(&new_row)
                    .execute(tx)
                    .map_err(|err| port_write_error(err, &snapshot, true))?;
                diesel::insert_into(port_allocation_logs::table)
                    .values(&log_row)
                    .execute(tx)
                    .map_err(|err| log_write_error(err, log_row.id))?;
                Ok(())
            })
        })
        .await
    }

    async fn commit_transition(&self, transition: &PortTransition) -> PortStoreResult<()> {
        let snapshot = transition.port().clone();
        let expected = transition.expected_version();
        let changeset = to_changeset(&snapshot)?;
        let log_row = to_new_log_row(transition.entry());

        self.run_blocking(move |connection| {
            connection.transaction::<_, PortStoreError, _>(|tx| {
                versioned_update(tx, &snapshot, expected, &changeset)?;
                diesel::insert_into(port_allocation_logs::table)
                    .values(&log_row)
                    .execute(tx)
                    .map_err(|err| log_write_error(err, log_row.id))?;
                Ok(())
            })
        })
        .await
    }

    async fn update_port(&self, port: &Port, expected_version: u64) -> PortStoreResult<()> {
        let snapshot = port.clone();
        let changeset = to_changeset(port)?;

        self.run_blocking(move |connection| {
            versioned_update(connection, &snapshot, expected_version, &changeset)
        })
        .await
    }

    async fn delete_port(&self, id: PortId, expected_version: u64) -> PortStoreResult<()> {
        let expected_column = version_to_column(expected_version)?;

        self.run_blocking(move |connection| {
            let deleted = diesel::delete(
                ports::table
                    .filter(ports::id.eq(id.into_inner()))
                    .filter(ports::version.eq(expected_column)),
            )
            .execute(connection)?;
            if deleted == 0 {
                return Err(missing_or_stale(connection, id, expected_version));
            }
            Ok(())
        })
        .await
    }

    async fn find_port(&self, id: PortId) -> PortStoreResult<Option<Port>> {
        self.run_blocking(move |connection| {
            let row = ports::table
                .filter(ports::id.eq(id.into_inner()))
                .select(PortRow::as_select())
                .first::<PortRow>(connection)
                .optional()?;
            row.map(row_to_port).transpose()
        })
        .await
    }

    async fn find_by_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> PortStoreResult<Option<Port>> {
        self.run_blocking(move |connection| {
            let row = ports::table
                .filter(ports::assigned_subscription_id.eq(subscription_id.into_inner()))
                .select(PortRow::as_select())
                .first::<PortRow>(connection)
                .optional()?;
            row.map(row_to_port).transpose()
        })
        .await
    }

    async fn find_ports(&self, ids: &[PortId]) -> PortStoreResult<Vec<Port>> {
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| id.into_inner()).collect();
        self.run_blocking(move |connection| {
            let rows = ports::table
                .filter(ports::id.eq_any(uuids))
                .select(PortRow::as_select())
                .load::<PortRow>(connection)?;
            rows.into_iter().map(row_to_port).collect()
        })
        .await
    }

    async fn list_ports(
        &self,
        filter: &PortFilter,
        page: PageRequest,
    ) -> PortStoreResult<Page<Port>> {
        let owned_filter = filter.clone();
        let limit = page_limit(page)?;
        let offset = page_offset(page)?;

        self.run_blocking(move |connection| {
            let total: i64 = filtered_ports(&owned_filter)
                .count()
                .get_result(connection)?;
            let rows = filtered_ports(&owned_filter)
                .order((ports::created_at.desc(), ports::id.asc()))
                .limit(limit)
                .offset(offset)
                .select(PortRow::as_select())
                .load::<PortRow>(connection)?;
            let items = rows
                .into_iter()
                .map(row_to_port)
                .collect::<PortStoreResult<Vec<_>>>()?;
            Ok(Page::new(items, count_to_u64(total)?, page))
        })
        .await
    }

    async fn available_ports(
        &self,
        region: Option<String>,
        limit: u64,
    ) -> PortStoreResult<Vec<Port>> {
        let row_limit = i64::try_from(limit).map_err(PortStoreError::persistence)?;

        self.run_blocking(move |connection| {
            let mut query = ports::table
                .filter(ports::status.eq(PortStatus::Available.as_str()))
                .into_boxed();
            if let Some(wanted) = region {
                query = query.filter(ports::server_region.ilike(escape_like(wanted.trim())));
            }
            let rows = query
                .order((ports::created_at.asc(), ports::id.asc()))
                .limit(row_limit)
                .select(PortRow::as_select())
                .load::<PortRow>(connection)?;
            rows.into_iter().map(row_to_port).collect()
        })
        .await
    }

    async fn status_counts(&self) -> PortStoreResult<StatusCounts> {
        self.run_blocking(move |connection| {
            let rows = ports::table
                .group_by(ports::status)
                .select((ports::status, count_star()))
                .load::<(String, i64)>(connection)?;
            let mut counts = StatusCounts::default();
            for (status, total) in rows {
                let parsed = PortStatus::try_from(status.as_str())
                    .map_err(PortStoreError::invalid_persisted_data)?;
                counts.add(parsed, count_to_u64(total)?);
            }
            Ok(counts)
        })
        .await
    }

    async fn query_log(
        &self,
        filter: &LogFilter,
        page: PageRequest,
    ) -> PortStoreResult<Page<AllocationLogEntry>> {
        let owned_filter = filter.clone();
        let limit = page_limit(page)?;
        let offset = page_offset(page)?;

        self.run_blocking(move |connection| {
            let total: i64 = filtered_log(&owned_filter)
                .count()
                .get_result(connection)?;
            let rows = filtered_log(&owned_filter)
                .order((
                    port_allocation_logs::created_at.desc(),
                    port_allocation_logs::seq.desc(),
                ))
                .limit(limit)
                .offset(offset)
                .select(AllocationLogRow::as_select())
                .load::<AllocationLogRow>(connection)?;
            let items = rows
                .into_iter()
                .map(row_to_log_entry)
                .collect::<PortStoreResult<Vec<_>>>()?;
            Ok(Page::new(items, count_to_u64(total)?, page))
        })
        .await
    }

    async fn distinct_actions(&self) -> PortStoreResult<BTreeSet<AllocationAction>> {
        self.run_blocking(move |connection| {
            let actions = port_allocation_logs::table
                .select(port_allocation_logs::action)
                .distinct()
                .load::<String>(connection)?;
            actions
                .iter()
                .map(|action| {
                    AllocationAction::try_from(action.as_str())
                        .map_err(PortStoreError::invalid_persisted_data)
                })
                .collect()
        })
        .await
    }

    async fn purge_log_before(&self, cutoff: DateTime<Utc>) -> PortStoreResult<u64> {
        self.run_blocking(move |connection| {
            let purged = diesel::delete(
                port_allocation_logs::table.filter(port_allocation_logs::created_at.lt(cutoff)),
            )
            .execute(connection)?;
            u64::try_from(purged).map_err(PortStoreError::persistence)
        })
        .await
    }
}

fn filtered_ports(filter: &PortFilter) -> ports::BoxedQuery<'static, Pg> {
    let mut query = ports::table.into_boxed();
    if let Some(status) = filter.status() {
        query = query.filter(ports::status.eq(status.as_str()));
    }
    if let Some(search) = filter.search() {
        let pattern = contains_pattern(search);
        query = query.filter(
            ports::instance_url
                .ilike(pattern.clone())
                .or(ports::db_host.ilike(pattern.clone()))
                .or(ports::db_name.ilike(pattern.clone()))
                .or(ports::notes.ilike(pattern)),
        );
    }
    query
}

fn filtered_log(filter: &LogFilter) -> port_allocation_logs::BoxedQuery<'static, Pg> {
    let mut query = port_allocation_logs::table.into_boxed();
    if let Some(action) = filter.action() {
        query = query.filter(port_allocation_logs::action.eq(action.as_str()));
    }
    if let Some(plan_id) = filter.plan_id() {
        query = query.filter(port_allocation_logs::plan_id.eq(plan_id.into_inner()));
    }
    if let Some(customer_id) = filter.customer_id() {
        query = query.filter(port_allocation_logs::customer_id.eq(customer_id.into_inner()));
    }
    if let Some(port_id) = filter.port_id() {
        query = query.filter(port_allocation_logs::port_id.eq(port_id.into_inner()));
    }
    if let Some(from) = filter.recorded_from() {
        query = query.filter(port_allocation_logs::created_at.ge(from));
    }
    if let Some(before) = filter.recorded_before() {
        query = query.filter(port_allocation_logs::created_at.lt(before));
    }
    if let Some(search) = filter.search() {
        let pattern = contains_pattern(search);
        let matching_ports = ports::table
            .filter(ports::instance_url.ilike(pattern.clone()))
            .select(ports::id.nullable());
        query = query.filter(
            port_allocation_logs::notes
                .ilike(pattern)
                .or(port_allocation_logs::port_id.eq_any(matching_ports)),
        );
    }
    query
}

fn versioned_update(
    connection: &mut PgConnection,
    port: &Port,
    expected_version: u64,
    changeset: &PortChangeset,
) -> PortStoreResult<()> {
    let expected_column = version_to_column(expected_version)?;
    let updated = diesel::update(
        ports::table
            .filter(ports::id.eq(port.id().into_inner()))
            .filter(ports::version.eq(expected_column)),
    )
    .set(changeset)
    .execute(connection)
    .map_err(|err| port_write_error(err, port, false))?;

    if updated == 0 {
        return Err(missing_or_stale(connection, port.id(), expected_version));
    }
    Ok(())
}

fn missing_or_stale(connection: &mut PgConnection, id: PortId, expected: u64) -> PortStoreError {
    let exists = ports::table
        .filter(ports::id.eq(id.into_inner()))
        .count()
        .get_result::<i64>(connection);
    match exists {
        Ok(0) => PortStoreError::NotFound(id),
        Ok(_) => PortStoreError::StaleVersion {
            port_id: id,
            expected,
        },
        Err(err) => PortStoreError::persistence(err),
    }
}

fn unique_violation(err: &DieselError) -> Option<String> {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            Some(info.constraint_name().unwrap_or_default().to_owned())
        }
        _ => None,
    }
}

fn port_write_error(err: DieselError, port: &Port, inserting: bool) -> PortStoreError {
    match unique_violation(&err).as_deref() {
        Some(INSTANCE_URL_INDEX) => {
            PortStoreError::DuplicateInstanceUrl(port.details().instance_url().clone())
        }
        Some(ASSIGNED_SUBSCRIPTION_INDEX) => port.assigned_subscription_id().map_or_else(
            || PortStoreError::persistence(err),
            PortStoreError::SubscriptionAlreadyAssigned,
        ),
        Some(_) if inserting => PortStoreError::DuplicatePort(port.id()),
        _ => PortStoreError::persistence(err),
    }
}

fn log_write_error(err: DieselError, id: uuid::Uuid) -> PortStoreError {
    match unique_violation(&err).as_deref() {
        Some(LOG_ID_INDEX) => PortStoreError::DuplicateLogEntry(LogEntryId::from_uuid(id)),
        _ => PortStoreError::persistence(err),
    }
}

fn page_limit(page: PageRequest) -> PortStoreResult<i64> {
    i64::try_from(page.page_size()).map_err(PortStoreError::persistence)
}

fn page_offset(page: PageRequest) -> PortStoreResult<i64> {
    i64::try_from(page.offset()).map_err(PortStoreError::persistence)
}

fn count_to_u64(count: i64) -> PortStoreResult<u64> {
    u64::try_from(count).map_err(PortStoreError::invalid_persisted_data)
}
