//! Read-only reference records owned by external collaborators.

use serde::{Deserialize, Serialize};

use crate::store::SECONDS_PER_DAY;

/// Infection metadata row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Infection {
    /// Stable infection id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Days after exposure before the infection is reliably test-detectable.
    pub window_period_max: i64,
    /// Minimum days after a positive result before a negative retest is trusted.
    pub treatment_period_min: i64,
}

impl Infection {
    /// Window period in seconds.
    #[must_use]
    pub const fn window_period_secs(&self) -> i64 {
        self.window_period_max * SECONDS_PER_DAY
    }

    /// Treatment period in seconds.
    #[must_use]
    pub const fn treatment_period_secs(&self) -> i64 {
        self.treatment_period_min * SECONDS_PER_DAY
    }
}

/// Display data for a profile pseudonym.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Profile pseudonym.
    pub pseudonym: String,
    /// Display name chosen by the user.
    pub display_name: String,
    /// Optional avatar location.
    pub avatar_path: Option<String>,
}

/// Membership record keyed by membership pseudonym.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    /// Membership pseudonym.
    pub pseudonym: String,
    /// Plan type.
    pub membership_type: String,
    /// Start (Unix timestamp).
    pub start_date: i64,
    /// End (Unix timestamp).
    pub end_date: i64,
}

impl Membership {
    /// Returns whether the membership covers `at`.
    #[must_use]
    pub const fn is_active(&self, at: i64) -> bool {
        self.start_date <= at && at <= self.end_date
    }
}
