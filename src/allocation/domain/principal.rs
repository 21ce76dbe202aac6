//! Acting principal for allocation operations.

use super::AdminUserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who performed an allocation operation.
///
/// Passed explicitly into every mutating service call; the crate holds no
/// ambient session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Principal {
    /// An authenticated administrator.
    Admin(AdminUserId),
    /// An automatic action taken by the provisioning workflow.
    System,
}

impl Principal {
    /// Returns the administrator identifier, or `None` for system actions.
    #[must_use]
    pub const fn admin_id(self) -> Option<AdminUserId> {
        match self {
            Self::Admin(id) => Some(id),
            Self::System => None,
        }
    }

    /// Rebuilds a principal from a stored `performed_by` column.
    #[must_use]
    pub const fn from_performed_by(performed_by: Option<AdminUserId>) -> Self {
        match performed_by {
            Some(id) => Self::Admin(id),
            None => Self::System,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin(id) => write!(f, "admin:{id}"),
            Self::System => f.write_str("system"),
        }
    }
}
