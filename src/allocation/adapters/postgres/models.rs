//! Diesel row models for port allocation persistence.

use super::schema::{port_allocation_logs, ports};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for port records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ports)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PortRow {
    /// Port identifier.
    pub id: uuid::Uuid,
    /// Instance URL.
    pub instance_url: String,
    /// Database host.
    pub db_host: Option<String>,
    /// Database name.
    pub db_name: Option<String>,
    /// Lifecycle status.
    pub status: String,
    /// Active subscription.
    pub assigned_subscription_id: Option<uuid::Uuid>,
    /// Assignment timestamp.
    pub assigned_at: Option<DateTime<Utc>>,
    /// Most recently released subscription.
    pub last_subscription_id: Option<uuid::Uuid>,
    /// Hosting region.
    pub server_region: Option<String>,
    /// Administrator notes.
    pub notes: Option<String>,
    /// Concurrency token.
    pub version: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for port records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ports)]
pub struct NewPortRow {
    /// Port identifier.
    pub id: uuid::Uuid,
    /// Instance URL.
    pub instance_url: String,
    /// Database host.
    pub db_host: Option<String>,
    /// Database name.
    pub db_name: Option<String>,
    /// Lifecycle status.
    pub status: String,
    /// Active subscription.
    pub assigned_subscription_id: Option<uuid::Uuid>,
    /// Assignment timestamp.
    pub assigned_at: Option<DateTime<Utc>>,
    /// Most recently released subscription.
    pub last_subscription_id: Option<uuid::Uuid>,
    /// Hosting region.
    pub server_region: Option<String>,
    /// Administrator notes.
    pub notes: Option<String>,
    /// Concurrency token.
    pub version: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Full-row update applied under a version check.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = ports, treat_none_as_null = true)]
pub struct PortChangeset {
    /// Instance URL.
    pub instance_url: String,
    /// Database host.
    pub db_host: Option<String>,
    /// Database name.
    pub db_name: Option<String>,
    /// Lifecycle status.
    pub status: String,
    /// Active subscription.
    pub assigned_subscription_id: Option<uuid::Uuid>,
    /// Assignment timestamp.
    pub assigned_at: Option<DateTime<Utc>>,
    /// Most recently released subscription.
    pub last_subscription_id: Option<uuid::Uuid>,
    /// Hosting region.
    pub server_region: Option<String>,
    /// Administrator notes.
    pub notes: Option<String>,
    /// New concurrency token.
    pub version: i64,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for allocation log records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = port_allocation_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AllocationLogRow {
    /// Entry identifier.
    pub id: uuid::Uuid,
    /// Recorded action.
    pub action: String,
    /// Weak port reference.
    pub port_id: Option<uuid::Uuid>,
    /// Weak customer reference.
    pub customer_id: Option<uuid::Uuid>,
    /// Weak subscription reference.
    pub subscription_id: Option<uuid::Uuid>,
    /// Weak plan reference.
    pub plan_id: Option<uuid::Uuid>,
    /// Acting administrator.
    pub performed_by: Option<uuid::Uuid>,
    /// Free-text justification.
    pub notes: Option<String>,
    /// Entry timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert model for allocation log records. `seq` is assigned by the
/// database.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = port_allocation_logs)]
pub struct NewAllocationLogRow {
    /// Entry identifier.
    pub id: uuid::Uuid,
    /// Recorded action.
    pub action: String,
    /// Weak port reference.
    pub port_id: Option<uuid::Uuid>,
    /// Weak customer reference.
    pub customer_id: Option<uuid::Uuid>,
    /// Weak subscription reference.
    pub subscription_id: Option<uuid::Uuid>,
    /// Weak plan reference.
    pub plan_id: Option<uuid::Uuid>,
    /// Acting administrator.
    pub performed_by: Option<uuid::Uuid>,
    /// Free-text justification.
    pub notes: Option<String>,
    /// Entry timestamp.
    pub created_at: DateTime<Utc>,
}
