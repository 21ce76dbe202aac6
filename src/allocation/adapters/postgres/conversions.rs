//! Conversions between Diesel rows and domain types.

use super::models::{
    AllocationLogRow, NewAllocationLogRow, NewPortRow, PortChangeset, PortRow,
};
use crate::allocation::{
    domain::{
        AdminUserId, AllocationAction, AllocationLogEntry, CustomerId, InstanceUrl, LogEntryId,
        PersistedLogEntryData, PersistedPortData, PlanId, Port, PortDetails, PortId, PortStatus,
        SubscriptionId,
    },
    ports::{PortStoreError, PortStoreResult},
};

pub(super) fn version_to_column(version: u64) -> PortStoreResult<i64> {
    i64::try_from(version).map_err(PortStoreError::persistence)
}

pub(super) fn to_new_port_row(port: &Port) -> PortStoreResult<NewPortRow> {
    let details = port.details();
    Ok(NewPortRow {
        id: port.id().into_inner(),
        instance_url: details.instance_url().as_str().to_owned(),
        db_host: details.db_host().map(str::to_owned),
        db_name: details.db_name().map(str::to_owned),
        status: port.status().as_str().to_owned(),
        assigned_subscription_id: port.assigned_subscription_id().map(SubscriptionId::into_inner),
        assigned_at: port.assigned_at(),
        last_subscription_id: port.last_subscription_id().map(SubscriptionId::into_inner),
        server_region: details.server_region().map(str::to_owned),
        notes: details.notes().map(str::to_owned),
        version: version_to_column(port.version())?,
        created_at: port.created_at(),
        updated_at: port.updated_at(),
    })
}

pub(super) fn to_changeset(port: &Port) -> PortStoreResult<PortChangeset> {
    let row = to_new_port_row(port)?;
    Ok(PortChangeset {
        instance_url: row.instance_url,
        db_host: row.db_host,
        db_name: row.db_name,
        status: row.status,
        assigned_subscription_id: row.assigned_subscription_id,
        assigned_at: row.assigned_at,
        last_subscription_id: row.last_subscription_id,
        server_region: row.server_region,
        notes: row.notes,
        version: row.version,
        updated_at: row.updated_at,
    })
}

pub(super) fn row_to_port(row: PortRow) -> PortStoreResult<Port> {
    let PortRow {
        id,
        instance_url,
        db_host,
        db_name,
        status,
        assigned_subscription_id,
        assigned_at,
        last_subscription_id,
        server_region,
        notes,
        version,
        created_at,
        updated_at,
    } = row;

    let url = InstanceUrl::new(instance_url).map_err(PortStoreError::invalid_persisted_data)?;
    let details = PortDetails::new(url)
        .with_db_host(db_host)
        .and_then(|built| built.with_db_name(db_name))
        .and_then(|built| built.with_server_region(server_region))
        .and_then(|built| built.with_notes(notes))
        .map_err(PortStoreError::invalid_persisted_data)?;
    let parsed_status =
        PortStatus::try_from(status.as_str()).map_err(PortStoreError::invalid_persisted_data)?;
    let parsed_version = u64::try_from(version).map_err(PortStoreError::invalid_persisted_data)?;

    let data = PersistedPortData {
        id: PortId::from_uuid(id),
        details,
        status: parsed_status,
        assigned_subscription_id: assigned_subscription_id.map(SubscriptionId::from_uuid),
        assigned_at,
        last_subscription_id: last_subscription_id.map(SubscriptionId::from_uuid),
        version: parsed_version,
        created_at,
        updated_at,
    };
    Ok(Port::from_persisted(data))
}

pub(super) fn to_new_log_row(entry: &AllocationLogEntry) -> NewAllocationLogRow {
    NewAllocationLogRow {
        id: entry.id().into_inner(),
        action: entry.action().as_str().to_owned(),
        port_id: entry.port_id().map(PortId::into_inner),
        customer_id: entry.customer_id().map(CustomerId::into_inner),
        subscription_id: entry.subscription_id().map(SubscriptionId::into_inner),
        plan_id: entry.plan_id().map(PlanId::into_inner),
        performed_by: entry.performed_by().map(AdminUserId::into_inner),
        notes: entry.notes().map(str::to_owned),
        created_at: entry.created_at(),
    }
}

pub(super) fn row_to_log_entry(row: AllocationLogRow) -> PortStoreResult<AllocationLogEntry> {
    let action = AllocationAction::try_from(row.action.as_str())
        .map_err(PortStoreError::invalid_persisted_data)?;
    let data = PersistedLogEntryData {
        id: LogEntryId::from_uuid(row.id),
        action,
        port_id: row.port_id.map(PortId::from_uuid),
        customer_id: row.customer_id.map(CustomerId::from_uuid),
        subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
        plan_id: row.plan_id.map(PlanId::from_uuid),
        performed_by: row.performed_by.map(AdminUserId::from_uuid),
        notes: row.notes,
        created_at: row.created_at,
    };
    Ok(AllocationLogEntry::from_persisted(data))
}

/// Escapes `LIKE` metacharacters so `term` matches literally.
pub(super) fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Wraps an escaped term for substring matching.
pub(super) fn contains_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}
