//! Karyalay port allocation: the tenant instance pool behind the back
//! office.
//!
//! Ports are provisioned tenant instances (an instance URL plus its
//! database) that move between available, reserved, assigned and disabled
//! as customer subscriptions start and end. Every lifecycle transition is
//! recorded in an append-only allocation log.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: the port state machine, log entries and query types
//! - **Ports**: async store and directory contracts
//! - **Adapters**: in-memory and `PostgreSQL` implementations
//! - **Services**: registry, allocation and log orchestration
//!
//! # Modules
//!
//! - [`allocation`]: port registry, allocation service and allocation log
//! - [`config`]: environment configuration

pub mod allocation;
pub mod config;
