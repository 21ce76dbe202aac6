//! Domain model for tenant port allocation.
//!
//! Ports are provisionable tenant instances moving through a small state
//! machine (available, reserved, assigned, disabled). Every transition is
//! paired with exactly one append-only allocation log entry. All
//! infrastructure concerns are kept outside the domain boundary.

mod action;
mod details;
mod error;
mod ids;
mod log_entry;
mod port;
mod principal;
mod query;
mod status;
mod subscription;
mod transition;
mod view;

pub use action::AllocationAction;
pub use details::{InstanceUrl, PortDetails};
pub use error::{ParseAllocationActionError, ParsePortStatusError, PortDomainError};
pub use ids::{AdminUserId, CustomerId, LogEntryId, PlanId, PortId, SubscriptionId};
pub use log_entry::{AllocationLogEntry, PersistedLogEntryData};
pub use port::{PersistedPortData, Port};
pub use principal::Principal;
pub use query::{DEFAULT_PAGE_SIZE, LogFilter, MAX_PAGE_SIZE, Page, PageRequest, PortFilter};
pub use status::{PortStatus, StatusCounts};
pub use subscription::SubscriptionSummary;
pub use transition::PortTransition;
pub use view::{AllocationLogView, PortSummary, ResolvedRef};
