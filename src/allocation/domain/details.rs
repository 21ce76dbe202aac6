//! Connection descriptors and descriptive metadata for a port.

use super::PortDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for an instance URL, matching the `VARCHAR(255)` column.
const MAX_URL_LENGTH: usize = 255;

/// Maximum length for host, database name and region columns.
const MAX_DESCRIPTOR_LENGTH: usize = 255;

/// Maximum length for free-text notes.
const MAX_NOTES_LENGTH: usize = 2000;

/// Validated URL of a provisioned tenant instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceUrl(String);

impl InstanceUrl {
    /// Creates a validated instance URL.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::EmptyInstanceUrl`] when the value is blank
    /// or [`PortDomainError::InstanceUrlTooLong`] when it exceeds 255
    /// characters.
    pub fn new(value: impl Into<String>) -> Result<Self, PortDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PortDomainError::EmptyInstanceUrl);
        }
        if trimmed.chars().count() > MAX_URL_LENGTH {
            return Err(PortDomainError::InstanceUrlTooLong(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for InstanceUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for InstanceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection descriptors and metadata describing a tenant instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDetails {
    instance_url: InstanceUrl,
    db_host: Option<String>,
    db_name: Option<String>,
    server_region: Option<String>,
    notes: Option<String>,
}

impl PortDetails {
    /// Creates details with only the instance URL set.
    #[must_use]
    pub const fn new(instance_url: InstanceUrl) -> Self {
        Self {
            instance_url,
            db_host: None,
            db_name: None,
            server_region: None,
            notes: None,
        }
    }

    /// Sets the database host. Blank values clear the field.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::FieldTooLong`] when the host exceeds 255
    /// characters.
    pub fn with_db_host(mut self, host: Option<String>) -> Result<Self, PortDomainError> {
        self.db_host = normalize_optional(host, "db_host", MAX_DESCRIPTOR_LENGTH)?;
        Ok(self)
    }

    /// Sets the database name. Blank values clear the field.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::FieldTooLong`] when the name exceeds 255
    /// characters.
    pub fn with_db_name(mut self, name: Option<String>) -> Result<Self, PortDomainError> {
        self.db_name = normalize_optional(name, "db_name", MAX_DESCRIPTOR_LENGTH)?;
        Ok(self)
    }

    /// Sets the server region. Blank values clear the field.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::FieldTooLong`] when the region exceeds 255
    /// characters.
    pub fn with_server_region(mut self, region: Option<String>) -> Result<Self, PortDomainError> {
        self.server_region = normalize_optional(region, "server_region", MAX_DESCRIPTOR_LENGTH)?;
        Ok(self)
    }

    /// Sets the notes. Blank values clear the field.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::FieldTooLong`] when the notes exceed 2000
    /// characters.
    pub fn with_notes(mut self, notes: Option<String>) -> Result<Self, PortDomainError> {
        self.notes = normalize_optional(notes, "notes", MAX_NOTES_LENGTH)?;
        Ok(self)
    }

    /// Returns the instance URL.
    #[must_use]
    pub const fn instance_url(&self) -> &InstanceUrl {
        &self.instance_url
    }

    /// Returns the database host, if recorded.
    #[must_use]
    pub fn db_host(&self) -> Option<&str> {
        self.db_host.as_deref()
    }

    /// Returns the database name, if recorded.
    #[must_use]
    pub fn db_name(&self) -> Option<&str> {
        self.db_name.as_deref()
    }

    /// Returns the server region, if recorded.
    #[must_use]
    pub fn server_region(&self) -> Option<&str> {
        self.server_region.as_deref()
    }

    /// Returns the notes, if recorded.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Returns whether `needle` (already lowercased) occurs in any
    /// searchable field.
    #[must_use]
    pub fn matches_search(&self, needle: &str) -> bool {
        let candidates = [
            Some(self.instance_url.as_str()),
            self.db_host(),
            self.db_name(),
            self.notes(),
        ];
        candidates
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Trims free text, collapsing blank input to `None`.
pub(crate) fn normalize_optional(
    value: Option<String>,
    field: &'static str,
    limit: usize,
) -> Result<Option<String>, PortDomainError> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > limit {
        return Err(PortDomainError::FieldTooLong { field, limit });
    }
    Ok(Some(trimmed.to_owned()))
}

/// Upper bound for log entry notes.
pub(crate) const LOG_NOTES_LIMIT: usize = MAX_NOTES_LENGTH;
