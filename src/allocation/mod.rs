//! Tenant port allocation.
//!
//! This module maintains the pool of provisionable tenant instances, binds
//! them to customer subscriptions and keeps the audit trail of every
//! transition. Assignment uses optimistic concurrency: each port carries a
//! version, and a transition commits only if the version it was loaded at
//! is still current, together with its log entry in one transaction. The
//! module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
