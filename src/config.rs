//! Runtime configuration.

use std::path::PathBuf;

use crate::connection::ConnectionLevel;

/// Default number of days a pending connection stays answerable.
pub const DEFAULT_PENDING_TTL_DAYS: i64 = 30;

/// Configuration for [`ExposureCore`](crate::ExposureCore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Path of the `SQLite` database.
    pub database_path: PathBuf,
    /// Days a pending connection stays answerable; `None` disables expiry.
    pub pending_request_ttl_days: Option<i64>,
    /// Lowest level that requires an active membership to request.
    pub membership_gate_level: ConnectionLevel,
}

impl CoreConfig {
    /// Creates a configuration with defaults for the given database path.
    #[must_use]
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            pending_request_ttl_days: Some(DEFAULT_PENDING_TTL_DAYS),
            membership_gate_level: ConnectionLevel::Bond,
        }
    }

    /// Sets the pending request expiry.
    #[must_use]
    pub const fn with_pending_ttl_days(mut self, days: Option<i64>) -> Self {
        self.pending_request_ttl_days = days;
        self
    }

    /// Sets the lowest membership-gated level.
    #[must_use]
    pub const fn with_membership_gate(mut self, level: ConnectionLevel) -> Self {
        self.membership_gate_level = level;
        self
    }
}
