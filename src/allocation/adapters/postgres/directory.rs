//! `PostgreSQL` subscription directory.

use super::{
    schema::{customers, plans, subscriptions},
    store::AllocationPgPool,
};
use crate::allocation::{
    domain::{CustomerId, PlanId, SubscriptionId, SubscriptionSummary},
    ports::{DirectoryError, DirectoryResult, SubscriptionDirectory},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use std::collections::HashMap;

/// Reads subscriptions, customers and plans from tables owned by the
/// billing subsystem.
#[derive(Debug, Clone)]
pub struct PostgresSubscriptionDirectory {
    pool: AllocationPgPool,
}

impl PostgresSubscriptionDirectory {
    /// Creates a directory from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: AllocationPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> DirectoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> DirectoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(DirectoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(DirectoryError::persistence)?
    }
}

#[async_trait]
impl SubscriptionDirectory for PostgresSubscriptionDirectory {
    async fn find_subscription(
        &self,
        id: SubscriptionId,
    ) -> DirectoryResult<Option<SubscriptionSummary>> {
        self.run_blocking(move |connection| {
            let row = subscriptions::table
                .filter(subscriptions::id.eq(id.into_inner()))
                .select((
                    subscriptions::id,
                    subscriptions::customer_id,
                    subscriptions::plan_id,
                ))
                .first::<(uuid::Uuid, Option<uuid::Uuid>, Option<uuid::Uuid>)>(connection)
                .optional()
                .map_err(DirectoryError::persistence)?;
            Ok(row.map(|(found, customer_id, plan_id)| {
                SubscriptionSummary::new(
                    SubscriptionId::from_uuid(found),
                    customer_id.map(CustomerId::from_uuid),
                    plan_id.map(PlanId::from_uuid),
                )
            }))
        })
        .await
    }

    async fn customer_names(
        &self,
        ids: &[CustomerId],
    ) -> DirectoryResult<HashMap<CustomerId, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| id.into_inner()).collect();
        self.run_blocking(move |connection| {
            let rows = customers::table
                .filter(customers::id.eq_any(uuids))
                .select((customers::id, customers::name))
                .load::<(uuid::Uuid, String)>(connection)
                .map_err(DirectoryError::persistence)?;
            Ok(rows
                .into_iter()
                .map(|(id, name)| (CustomerId::from_uuid(id), name))
                .collect())
        })
        .await
    }

    async fn plan_names(&self, ids: &[PlanId]) -> DirectoryResult<HashMap<PlanId, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| id.into_inner()).collect();
        self.run_blocking(move |connection| {
            let rows = plans::table
                .filter(plans::id.eq_any(uuids))
                .select((plans::id, plans::name))
                .load::<(uuid::Uuid, String)>(connection)
                .map_err(DirectoryError::persistence)?;
            Ok(rows
                .into_iter()
                .map(|(id, name)| (PlanId::from_uuid(id), name))
                .collect())
        })
        .await
    }
}
