//! Error types for port allocation domain validation and parsing.

use super::{PortId, PortStatus};
use thiserror::Error;

/// Errors returned while constructing or transitioning port domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortDomainError {
    /// The instance URL is empty after trimming.
    #[error("instance URL must not be empty")]
    EmptyInstanceUrl,

    /// The instance URL exceeds the 255-character storage limit.
    #[error("instance URL exceeds 255 character limit: {0}")]
    InstanceUrlTooLong(String),

    /// A descriptive field exceeds its storage limit.
    #[error("{field} exceeds {limit} character limit")]
    FieldTooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Maximum accepted length in characters.
        limit: usize,
    },

    /// Pagination parameters are out of range.
    #[error("invalid page request: page {page}, page size {page_size} (page size must be 1..={max})")]
    InvalidPageRequest {
        /// Requested 1-based page number.
        page: u64,
        /// Requested page size.
        page_size: u64,
        /// Largest accepted page size.
        max: u64,
    },

    /// The requested lifecycle transition is not allowed from the current
    /// status.
    #[error("port {port_id} cannot {operation} while {status}")]
    IllegalTransition {
        /// Port the transition was attempted on.
        port_id: PortId,
        /// Operation that was attempted.
        operation: &'static str,
        /// Status the port was in.
        status: PortStatus,
    },

    /// The port is assigned and cannot be removed from the pool.
    #[error("port {0} is assigned and must be released before it can be deleted")]
    DeleteAssignedPort(PortId),
}

impl PortDomainError {
    /// Returns whether the error describes a state conflict rather than
    /// malformed input.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::IllegalTransition { .. } | Self::DeleteAssignedPort(_)
        )
    }
}

/// Error returned while parsing a port status from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown port status: {0}")]
pub struct ParsePortStatusError(pub String);

/// Error returned while parsing an allocation action from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown allocation action: {0}")]
pub struct ParseAllocationActionError(pub String);
