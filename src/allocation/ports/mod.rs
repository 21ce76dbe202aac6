//! Port contracts for tenant port allocation.
//!
//! Ports define infrastructure-agnostic interfaces used by the allocation
//! services.

pub mod directory;
pub mod store;

pub use directory::{DirectoryError, DirectoryResult, SubscriptionDirectory};
pub use store::{PortStore, PortStoreError, PortStoreResult};
