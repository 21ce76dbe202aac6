//! Environment configuration for port allocation deployments.
//!
//! Every field maps to `KARYALAY_PORTS_<FIELD>`:
//!
//! - `KARYALAY_PORTS_DATABASE_URL` (required)
//! - `KARYALAY_PORTS_POOL_MAX_SIZE` (default 8)
//! - `KARYALAY_PORTS_ALLOCATION_ATTEMPTS` (default 3)
//! - `KARYALAY_PORTS_PAGE_SIZE` (default 20, at most 100)

use crate::allocation::domain::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageRequest, PortDomainError};
use crate::allocation::services::DEFAULT_ALLOCATION_ATTEMPTS;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Prefix shared by all configuration variables.
pub const ENV_PREFIX: &str = "KARYALAY_PORTS_";

const DEFAULT_POOL_MAX_SIZE: u32 = 8;

/// Runtime settings for the allocation services and their database pool.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AllocatorConfig {
    /// `PostgreSQL` connection URL.
    pub database_url: String,
    /// Upper bound on pooled database connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
    /// Candidates tried by automatic allocation before giving up.
    #[serde(default = "default_allocation_attempts")]
    pub allocation_attempts: u32,
    /// Default page size for listings.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

const fn default_pool_max_size() -> u32 {
    DEFAULT_POOL_MAX_SIZE
}

const fn default_allocation_attempts() -> u32 {
    DEFAULT_ALLOCATION_ATTEMPTS
}

const fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was missing or could not be parsed.
    #[error("failed to load configuration from {ENV_PREFIX}* variables: {0}")]
    Env(#[from] envy::Error),

    /// A numeric setting is outside its accepted range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        /// Offending setting.
        field: &'static str,
        /// Value supplied.
        value: u64,
        /// Smallest accepted value.
        min: u64,
        /// Largest accepted value.
        max: u64,
    },
}

impl AllocatorConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is missing, malformed or out
    /// of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Loads configuration from explicit key/value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is missing, malformed or out
    /// of range.
    pub fn from_vars(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let config: Self = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks numeric settings against their accepted ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("pool_max_size", u64::from(self.pool_max_size), 1, u64::from(u32::MAX))?;
        check_range(
            "allocation_attempts",
            u64::from(self.allocation_attempts),
            1,
            u64::from(u32::MAX),
        )?;
        check_range("page_size", self.page_size, 1, MAX_PAGE_SIZE)
    }

    /// Builds a request for `page` using the configured page size.
    ///
    /// # Errors
    ///
    /// Returns [`PortDomainError::InvalidPageRequest`] when `page` is zero.
    pub const fn page_request(&self, page: u64) -> Result<PageRequest, PortDomainError> {
        PageRequest::new(page, self.page_size)
    }
}

impl fmt::Debug for AllocatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocatorConfig")
            .field("database_url", &"<redacted>")
            .field("pool_max_size", &self.pool_max_size)
            .field("allocation_attempts", &self.allocation_attempts)
            .field("page_size", &self.page_size)
            .finish()
    }
}

const fn check_range(
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
