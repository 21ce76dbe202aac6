//! Service-level errors shared by the allocation services.

use crate::allocation::{
    domain::{PortDomainError, PortId, SubscriptionId},
    ports::{DirectoryError, PortStoreError},
};
use std::fmt;
use thiserror::Error;

/// Coarse classification of a service failure, used by callers to choose a
/// response (form error, 404, retry prompt, 500).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request was malformed.
    Validation,
    /// A referenced record does not exist.
    NotFound,
    /// The request clashes with current state or a concurrent writer.
    Conflict,
    /// Storage or lookup infrastructure failed.
    Persistence,
}

impl ErrorKind {
    /// Returns the kind as a stable lowercase string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Persistence => "persistence",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the port registry, allocation and log services.
#[derive(Debug, Error)]
pub enum PortServiceError {
    /// Domain validation or state machine rejection.
    #[error(transparent)]
    Domain(#[from] PortDomainError),

    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] PortStoreError),

    /// Subscription directory lookup failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The port does not exist.
    #[error("port not found: {0}")]
    PortNotFound(PortId),

    /// The subscription does not exist.
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(SubscriptionId),

    /// The subscription is already bound to another port.
    #[error("subscription {subscription_id} already holds port {port_id}")]
    SubscriptionHoldsPort {
        /// Subscription being assigned.
        subscription_id: SubscriptionId,
        /// Port the subscription currently holds.
        port_id: PortId,
    },

    /// No available port matches the request.
    #[error("no available port matches the request (region: {region:?})")]
    PoolExhausted {
        /// Region the caller asked for, if any.
        region: Option<String>,
    },

    /// Available ports remain but concurrent writers claimed every
    /// candidate tried within the attempt budget.
    #[error("subscription {subscription_id} lost every candidate port in {attempts} attempts")]
    AllocationContended {
        /// Subscription being allocated.
        subscription_id: SubscriptionId,
        /// Pool reads made before giving up.
        attempts: u32,
    },
}

impl PortServiceError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(err) if err.is_conflict() => ErrorKind::Conflict,
            Self::Domain(_) => ErrorKind::Validation,
            Self::Store(PortStoreError::NotFound(_))
            | Self::PortNotFound(_)
            | Self::SubscriptionNotFound(_) => ErrorKind::NotFound,
            Self::Store(err) if err.is_conflict() => ErrorKind::Conflict,
            Self::Store(_) | Self::Directory(_) => ErrorKind::Persistence,
            Self::SubscriptionHoldsPort { .. }
            | Self::PoolExhausted { .. }
            | Self::AllocationContended { .. } => ErrorKind::Conflict,
        }
    }

    /// Returns whether the error is a [`ErrorKind::Conflict`].
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict)
    }

    /// Returns whether another attempt against a fresh candidate may
    /// succeed.
    pub(crate) const fn is_lost_race(&self) -> bool {
        matches!(
            self,
            Self::Store(PortStoreError::StaleVersion { .. })
                | Self::Domain(PortDomainError::IllegalTransition { .. })
        )
    }
}

/// Result type for allocation service operations.
pub type PortServiceResult<T> = Result<T, PortServiceError>;
