//! In-memory adapters for port allocation.

mod directory;
mod store;

pub use directory::InMemorySubscriptionDirectory;
pub use store::InMemoryPortStore;
