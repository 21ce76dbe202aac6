//! Application services for port registry management, allocation and the
//! audit log.

mod allocation;
mod error;
mod log;
mod registry;

pub use allocation::{AllocationPreference, DEFAULT_ALLOCATION_ATTEMPTS, PortAllocationService};
pub use error::{ErrorKind, PortServiceError, PortServiceResult};
pub use log::AllocationLogService;
pub use registry::{ImportRejection, ImportReport, PortDetailsRequest, PortRegistryService};
