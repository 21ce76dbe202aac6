//! Step definitions for tenant port allocation scenarios.

pub mod world;

mod given;
