//! Port pool management: creation, import, lookup, listing, editing and
//! removal.

use super::error::{PortServiceError, PortServiceResult};
use crate::allocation::{
    domain::{
        AllocationAction, AllocationLogEntry, InstanceUrl, Page, PageRequest, Port, PortDetails,
        PortDomainError, PortFilter, PortId, Principal, StatusCounts,
    },
    ports::PortStore,
};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Descriptive fields for creating or editing a port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDetailsRequest {
    instance_url: String,
    #[serde(default)]
    db_host: Option<String>,
    #[serde(default)]
    db_name: Option<String>,
    #[serde(default)]
    server_region: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

impl PortDetailsRequest {
    /// Creates a request with the required instance URL.
    #[must_use]
    pub fn new(instance_url: impl Into<String>) -> Self {
        Self {
            instance_url: instance_url.into(),
            ..Self::default()
        }
    }

    /// Sets the database host.
    #[must_use]
    pub fn with_db_host(mut self, db_host: impl Into<String>) -> Self {
        self.db_host = Some(db_host.into());
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = Some(db_name.into());
        self
    }

    /// Sets the hosting region.
    #[must_use]
    pub fn with_server_region(mut self, server_region: impl Into<String>) -> Self {
        self.server_region = Some(server_region.into());
        self
    }

    /// Sets administrator notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    fn into_details(self) -> Result<PortDetails, PortDomainError> {
        let url = InstanceUrl::new(self.instance_url)?;
        PortDetails::new(url)
            .with_db_host(self.db_host)?
            .with_db_name(self.db_name)?
            .with_server_region(self.server_region)?
            .with_notes(self.notes)
    }
}

/// A row rejected during bulk import.
#[derive(Debug)]
pub struct ImportRejection {
    /// Zero-based position of the row in the submitted batch.
    pub index: usize,
    /// Why the row was rejected.
    pub error: PortServiceError,
}

/// Outcome of a bulk import.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Ports created, in submission order.
    pub created: Vec<Port>,
    /// Rows that could not be created.
    pub rejected: Vec<ImportRejection>,
}

/// Maintains the pool of provisionable ports.
#[derive(Clone)]
pub struct PortRegistryService<S, C>
where
    S: PortStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> PortRegistryService<S, C>
where
    S: PortStore,
    C: Clock + Send + Sync,
{
    /// Creates a registry service.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Adds an available port to the pool and records `CREATED`.
    ///
    /// # Errors
    ///
    /// Returns [`PortServiceError::Domain`] for invalid fields and
    /// [`PortServiceError::Store`] when the instance URL is already in use
    /// or persistence fails.
    pub async fn create(
        &self,
        request: PortDetailsRequest,
        principal: Principal,
    ) -> PortServiceResult<Port> {
        let details = request.into_details()?;
        let port = Port::new(details, &*self.clock);
        let entry =
            AllocationLogEntry::new(AllocationAction::Created, port.id(), principal, &*self.clock);

        self.store
            .insert_port(&port, &entry)
            .await
            .inspect_err(|err| {
                warn!(
                    instance_url = %port.details().instance_url(),
                    error = %err,
                    "port creation rejected"
                );
            })?;
        info!(
            port_id = %port.id(),
            instance_url = %port.details().instance_url(),
            %principal,
            "port created"
        );
        Ok(port)
    }

    /// Creates each row independently, collecting failures instead of
    /// aborting the batch.
    pub async fn import(
        &self,
        requests: impl IntoIterator<Item = PortDetailsRequest>,
        principal: Principal,
    ) -> ImportReport {
        let mut report = ImportReport::default();
        for (index, request) in requests.into_iter().enumerate() {
            match self.create(request, principal).await {
                Ok(port) => report.created.push(port),
                Err(error) => report.rejected.push(ImportRejection { index, error }),
            }
        }
        info!(
            created = report.created.len(),
            rejected = report.rejected.len(),
            "port import finished"
        );
        report
    }

    /// Loads a port.
    ///
    /// # Errors
    ///
    /// Returns [`PortServiceError::PortNotFound`] when the port does not
    /// exist.
    pub async fn get(&self, id: PortId) -> PortServiceResult<Port> {
        self.store
            .find_port(id)
            .await?
            .ok_or(PortServiceError::PortNotFound(id))
    }

    /// Lists ports newest first.
    ///
    /// # Errors
    ///
    /// Returns [`PortServiceError::Store`] when persistence fails.
    pub async fn list(
        &self,
        filter: &PortFilter,
        page: PageRequest,
    ) -> PortServiceResult<Page<Port>> {
        debug!(
            status = ?filter.status(),
            search = ?filter.search(),
            page = page.page(),
            "listing ports"
        );
        Ok(self.store.list_ports(filter, page).await?)
    }

    /// Replaces the descriptive fields of a port.
    ///
    /// Editing is not a lifecycle transition and writes no log entry.
    ///
    /// # Errors
    ///
    /// Returns [`PortServiceError::PortNotFound`], a validation error, or a
    /// conflict when the URL is taken or the port changed concurrently.
    pub async fn update_details(
        &self,
        id: PortId,
        request: PortDetailsRequest,
        principal: Principal,
    ) -> PortServiceResult<Port> {
        let mut port = self.get(id).await?;
        let expected_version = port.version();
        port.update_details(request.into_details()?, &*self.clock);

        self.store.update_port(&port, expected_version).await?;
        info!(port_id = %id, %principal, "port details updated");
        Ok(port)
    }

    /// Removes a port from the pool. Log entries keep its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PortServiceError::PortNotFound`], or a conflict when the
    /// port is assigned or changed concurrently.
    pub async fn delete(&self, id: PortId, principal: Principal) -> PortServiceResult<()> {
        let port = self.get(id).await?;
        port.ensure_deletable().inspect_err(|err| {
            warn!(port_id = %id, error = %err, "port deletion refused");
        })?;

        self.store.delete_port(id, port.version()).await?;
        info!(port_id = %id, %principal, "port deleted");
        Ok(())
    }

    /// Returns per-status totals for the whole pool.
    ///
    /// # Errors
    ///
    /// Returns [`PortServiceError::Store`] when persistence fails.
    pub async fn status_counts(&self) -> PortServiceResult<StatusCounts> {
        Ok(self.store.status_counts().await?)
    }
}
