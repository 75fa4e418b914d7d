//! Core types for health status tracking.

use serde::{Deserialize, Serialize};

use super::masking::DateBucket;
use crate::pseudonym::short;

/// Projected health status for one infection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum HealthStatusCode {
    /// No result on record.
    #[default]
    NotTested,
    /// Latest trusted result was negative.
    Negative,
    /// A partner's alert marked this user as possibly exposed.
    Exposed,
    /// Latest result was positive.
    Positive,
}

impl HealthStatusCode {
    /// Converts to the stored numeric code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::NotTested => 0,
            Self::Negative => 1,
            Self::Exposed => 2,
            Self::Positive => 3,
        }
    }

    /// Parses from the stored numeric code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::NotTested),
            1 => Some(Self::Negative),
            2 => Some(Self::Exposed),
            3 => Some(Self::Positive),
            _ => None,
        }
    }

    /// Converts to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotTested => "not_tested",
            Self::Negative => "negative",
            Self::Exposed => "exposed",
            Self::Positive => "positive",
        }
    }
}

impl From<HealthStatusCode> for i64 {
    fn from(code: HealthStatusCode) -> Self {
        code.code()
    }
}

impl TryFrom<i64> for HealthStatusCode {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("invalid health status: {code}"))
    }
}

/// Current projection for one `(health pseudonym, infection)` key.
#[derive(Clone, PartialEq, Eq)]
pub struct HealthStatusRecord {
    /// Health pseudonym of the subject.
    pub pseudonym: String,
    /// Infection id.
    pub infection_id: String,
    /// Projected status.
    pub status: HealthStatusCode,
    /// Date of the result or alert behind `status` (Unix timestamp).
    pub status_date: Option<i64>,
    /// Unread alert flag.
    pub new_alert: bool,
    /// Last write (Unix timestamp).
    pub updated_at: i64,
}

impl std::fmt::Debug for HealthStatusRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthStatusRecord")
            .field("pseudonym", &short(&self.pseudonym))
            .field("infection_id", &self.infection_id)
            .field("status", &self.status)
            .field("status_date", &self.status_date)
            .field("new_alert", &self.new_alert)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl HealthStatusRecord {
    /// A not-tested placeholder for an infection without a stored record.
    #[must_use]
    pub fn not_tested(pseudonym: &str, infection_id: &str, updated_at: i64) -> Self {
        Self {
            pseudonym: pseudonym.to_string(),
            infection_id: infection_id.to_string(),
            status: HealthStatusCode::NotTested,
            status_date: None,
            new_alert: false,
            updated_at,
        }
    }
}

/// One submitted test result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSubmission {
    /// Infection id.
    pub infection_id: String,
    /// Whether the result was positive.
    pub positive: bool,
    /// Test date (Unix timestamp).
    pub test_date: i64,
}

/// Immutable ledger entry.
#[derive(Clone, PartialEq, Eq)]
pub struct TestResult {
    /// Ledger row id.
    pub id: i64,
    /// Test pseudonym of the subject.
    pub pseudonym: String,
    /// Infection id.
    pub infection_id: String,
    /// Whether the result was positive.
    pub positive: bool,
    /// Test date (Unix timestamp).
    pub test_date: i64,
    /// When the result was submitted (Unix timestamp).
    pub submitted_at: i64,
}

impl std::fmt::Debug for TestResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestResult")
            .field("id", &self.id)
            .field("pseudonym", &short(&self.pseudonym))
            .field("infection_id", &self.infection_id)
            .field("positive", &self.positive)
            .field("test_date", &self.test_date)
            .field("submitted_at", &self.submitted_at)
            .finish()
    }
}

/// Effect of one submission on the projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    /// Infection id.
    pub infection_id: String,
    /// Whether the result was positive.
    pub positive: bool,
    /// Test date (Unix timestamp).
    pub test_date: i64,
    /// Status before the submission.
    pub previous: HealthStatusCode,
    /// Status after the submission.
    pub current: HealthStatusCode,
    /// Whether the projection was written.
    pub changed: bool,
}

impl SubmissionOutcome {
    /// Returns whether the projection moved to a fresher negative.
    #[must_use]
    pub fn is_fresh_negative(&self) -> bool {
        self.changed && self.current == HealthStatusCode::Negative
    }
}

/// Effect of an exposure alert on the recipient's projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureOutcome {
    /// Status set to Exposed; the unread flag was raised.
    Marked,
    /// Already Exposed; only the date moved.
    Refreshed,
    /// Already Positive; nothing written.
    Refused,
}

/// Caller-facing view of one infection's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatusView {
    /// Infection id.
    pub infection_id: String,
    /// Infection display name.
    pub infection_name: String,
    /// Projected status.
    pub status: HealthStatusCode,
    /// Exact status date; `None` when masked or absent.
    pub status_date: Option<i64>,
    /// Coarse date bucket; set only when masked.
    pub date_bucket: Option<DateBucket>,
    /// Unread alert flag.
    pub new_alert: bool,
}
