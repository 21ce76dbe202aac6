//! `PostgreSQL` adapters for port allocation persistence.

mod conversions;
mod directory;
mod models;
mod schema;
mod store;

pub use directory::PostgresSubscriptionDirectory;
pub use store::{AllocationPgPool, PostgresPortStore};
