//! Adapter implementations for the port store and subscription directory.

pub mod memory;
pub mod postgres;
