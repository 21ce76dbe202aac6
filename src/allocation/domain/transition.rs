//! Unit of work handed to stores for atomic commit.

use super::{AllocationLogEntry, Port};

/// A port state change paired with the log entry describing it.
///
/// Stores apply the change only if the persisted port still carries
/// `expected_version`, and must write the port and the entry in a single
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTransition {
    port: Port,
    expected_version: u64,
    entry: AllocationLogEntry,
}

impl PortTransition {
    /// Bundles a mutated port with the version it was loaded at and its log
    /// entry.
    #[must_use]
    pub const fn new(port: Port, expected_version: u64, entry: AllocationLogEntry) -> Self {
        Self {
            port,
            expected_version,
            entry,
        }
    }

    /// Returns the port state to persist.
    #[must_use]
    pub const fn port(&self) -> &Port {
        &self.port
    }

    /// Returns the version the persisted row must still carry.
    #[must_use]
    pub const fn expected_version(&self) -> u64 {
        self.expected_version
    }

    /// Returns the log entry to append.
    #[must_use]
    pub const fn entry(&self) -> &AllocationLogEntry {
        &self.entry
    }

    /// Consumes the transition, yielding the committed port.
    #[must_use]
    pub fn into_port(self) -> Port {
        self.port
    }
}
