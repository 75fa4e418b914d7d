//! Core types for exposure alert edges.
//!
//! # Status codes
//!
//! | Code | Status | Meaning |
//! |------|--------|---------|
//! | 0 | `PendingRequest` | awaiting the sender's answer |
//! | 1 | `Active` | watching the sender's results |
//! | 2 | `Sent` | the sender tested positive, recipient notified |
//! | 3 | `Deactivated` | superseded by a newer edge |
//! | 4 | `Declined` | the sender refused the request |
//! | 5 | `Expired` | replaced by a newer request |

use serde::{Deserialize, Serialize};

use crate::pseudonym::short;

/// Lifecycle status of an alert edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum AlertStatus {
    /// Requested by the recipient, not yet answered.
    PendingRequest,
    /// In force.
    Active,
    /// Fired by a positive result.
    Sent,
    /// Retired.
    Deactivated,
    /// Refused by the sender.
    Declined,
    /// Replaced by a newer request.
    Expired,
}

impl AlertStatus {
    /// Converts to the stored numeric code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::PendingRequest => 0,
            Self::Active => 1,
            Self::Sent => 2,
            Self::Deactivated => 3,
            Self::Declined => 4,
            Self::Expired => 5,
        }
    }

    /// Parses from the stored numeric code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::PendingRequest),
            1 => Some(Self::Active),
            2 => Some(Self::Sent),
            3 => Some(Self::Deactivated),
            4 => Some(Self::Declined),
            5 => Some(Self::Expired),
            _ => None,
        }
    }

    /// Converts to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingRequest => "pending_request",
            Self::Active => "active",
            Self::Sent => "sent",
            Self::Deactivated => "deactivated",
            Self::Declined => "declined",
            Self::Expired => "expired",
        }
    }
}

impl From<AlertStatus> for i64 {
    fn from(status: AlertStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i64> for AlertStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("invalid alert status: {code}"))
    }
}

/// Answer to a pending alert request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDecision {
    /// Start sharing alerts.
    Accept,
    /// Refuse the request.
    Decline,
}

impl AlertDecision {
    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accept" => Some(Self::Accept),
            "decline" => Some(Self::Decline),
            _ => None,
        }
    }
}

/// A directed alert edge between two exposure pseudonyms.
#[derive(Clone, PartialEq, Eq)]
pub struct ExposureAlert {
    /// Document id.
    pub id: String,
    /// Infection the edge watches.
    pub infection_id: String,
    /// Exposure pseudonym of the person whose results are watched.
    pub sender: String,
    /// Exposure pseudonym of the person notified.
    pub recipient: String,
    /// Lifecycle status.
    pub status: AlertStatus,
    /// When the edge was created (Unix timestamp).
    pub created_at: i64,
    /// When the edge was last updated (Unix timestamp).
    pub updated_at: i64,
}

impl std::fmt::Debug for ExposureAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExposureAlert")
            .field("id", &self.id)
            .field("infection_id", &self.infection_id)
            .field("sender", &short(&self.sender))
            .field("recipient", &short(&self.recipient))
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_roundtrip() {
        for code in 0..6 {
            let status = AlertStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(AlertStatus::from_code(6), None);
    }

    #[test]
    fn decision_parse() {
        assert_eq!(AlertDecision::parse("accept"), Some(AlertDecision::Accept));
        assert_eq!(AlertDecision::parse("decline"), Some(AlertDecision::Decline));
        assert_eq!(AlertDecision::parse("maybe"), None);
        let decision: AlertDecision = serde_json::from_str(r#""decline""#).unwrap();
        assert_eq!(decision, AlertDecision::Decline);
    }
}
