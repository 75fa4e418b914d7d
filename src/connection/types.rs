//! Core types for connections.
//!
//! A connection is a relationship record between two standard pseudonyms.
//! Records are never hard-deleted; a level change writes a new record and
//! retires the old one through its status.
//!
//! # Status codes
//!
//! | Code | Status | Terminal |
//! |------|--------|----------|
//! | 0 | Pending | no |
//! | 1 | Active | no |
//! | 2 | Rejected | yes |
//! | 4 | Deactivated | yes |
//! | 5 | Cancelled | yes |
//!
//! Code 3 is never written. Expired pending requests are retired as
//! Cancelled.

use serde::{Deserialize, Serialize};

use crate::pseudonym::{pseudonyms_match, short};

/// Trust tier of a connection, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum ConnectionLevel {
    /// Blocked.
    Blocked,
    /// New connection, no health sharing.
    New,
    /// Friend.
    Friend,
    /// Bond.
    Bond,
    /// Bond-elevated, the highest tier.
    BondElevated,
}

impl ConnectionLevel {
    /// Levels whose partners receive continuity-of-monitoring alert edges.
    pub const TOP_TWO: [Self; 2] = [Self::Bond, Self::BondElevated];

    /// Converts to the stored numeric code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Blocked => 1,
            Self::New => 2,
            Self::Friend => 3,
            Self::Bond => 4,
            Self::BondElevated => 5,
        }
    }

    /// Parses from the stored numeric code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Blocked),
            2 => Some(Self::New),
            3 => Some(Self::Friend),
            4 => Some(Self::Bond),
            5 => Some(Self::BondElevated),
            _ => None,
        }
    }

    /// Returns whether health sharing and alert edges apply at this level.
    #[must_use]
    pub const fn shares_health(self) -> bool {
        self.code() >= Self::Friend.code()
    }
}

impl From<ConnectionLevel> for i64 {
    fn from(level: ConnectionLevel) -> Self {
        level.code()
    }
}

impl TryFrom<i64> for ConnectionLevel {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("invalid connection level: {code}"))
    }
}

/// Lifecycle status of a connection record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum ConnectionStatus {
    /// Awaiting the recipient's answer.
    Pending,
    /// In force.
    Active,
    /// Declined by the recipient.
    Rejected,
    /// Superseded or disconnected.
    Deactivated,
    /// Withdrawn by the requester, or expired.
    Cancelled,
}

impl ConnectionStatus {
    /// Converts to the stored numeric code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Pending => 0,
            Self::Active => 1,
            Self::Rejected => 2,
            Self::Deactivated => 4,
            Self::Cancelled => 5,
        }
    }

    /// Parses from the stored numeric code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Active),
            2 => Some(Self::Rejected),
            4 => Some(Self::Deactivated),
            5 => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns whether the record is retired.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.code() >= Self::Rejected.code()
    }
}

impl From<ConnectionStatus> for i64 {
    fn from(status: ConnectionStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i64> for ConnectionStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("invalid connection status: {code}"))
    }
}

/// A connection record.
#[derive(Clone, PartialEq, Eq)]
pub struct Connection {
    /// Document id.
    pub id: String,
    /// Standard pseudonym of the requester.
    pub sender: String,
    /// Standard pseudonym of the other participant.
    pub recipient: String,
    /// Trust tier.
    pub level: ConnectionLevel,
    /// Lifecycle status.
    pub status: ConnectionStatus,
    /// When the record was created (Unix timestamp).
    pub created_at: i64,
    /// When the record was last updated (Unix timestamp).
    pub updated_at: i64,
    /// When a pending record stops being answerable (Unix timestamp).
    pub expires_at: Option<i64>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("sender", &short(&self.sender))
            .field("recipient", &short(&self.recipient))
            .field("level", &self.level)
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Connection {
    /// Returns whether `pseudonym` is the sender or recipient.
    #[must_use]
    pub fn is_participant(&self, pseudonym: &str) -> bool {
        pseudonyms_match(&self.sender, pseudonym) || pseudonyms_match(&self.recipient, pseudonym)
    }

    /// Returns whether `pseudonym` is the sender.
    #[must_use]
    pub fn is_sender(&self, pseudonym: &str) -> bool {
        pseudonyms_match(&self.sender, pseudonym)
    }

    /// Returns the other participant, if `pseudonym` is one of them.
    #[must_use]
    pub fn counterpart(&self, pseudonym: &str) -> Option<&str> {
        if pseudonyms_match(&self.sender, pseudonym) {
            Some(&self.recipient)
        } else if pseudonyms_match(&self.recipient, pseudonym) {
            Some(&self.sender)
        } else {
            None
        }
    }

    /// Returns whether a pending record is past its expiry.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.status == ConnectionStatus::Pending && self.expires_at.is_some_and(|at| now > at)
    }

    /// Returns whether the record still counts toward the pair's live set.
    #[must_use]
    pub fn is_live(&self, now: i64) -> bool {
        !self.status.is_terminal() && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(status: ConnectionStatus, expires_at: Option<i64>) -> Connection {
        Connection {
            id: "c1".to_string(),
            sender: "a".repeat(64),
            recipient: "b".repeat(64),
            level: ConnectionLevel::New,
            status,
            created_at: 100,
            updated_at: 100,
            expires_at,
        }
    }

    #[test]
    fn level_codes_roundtrip() {
        for level in [
            ConnectionLevel::Blocked,
            ConnectionLevel::New,
            ConnectionLevel::Friend,
            ConnectionLevel::Bond,
            ConnectionLevel::BondElevated,
        ] {
            assert_eq!(ConnectionLevel::from_code(level.code()), Some(level));
        }
        assert_eq!(ConnectionLevel::from_code(0), None);
        assert_eq!(ConnectionLevel::from_code(6), None);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(ConnectionLevel::Blocked < ConnectionLevel::New);
        assert!(ConnectionLevel::Bond < ConnectionLevel::BondElevated);
        assert!(ConnectionLevel::Friend.shares_health());
        assert!(!ConnectionLevel::New.shares_health());
    }

    #[test]
    fn status_code_three_is_unused() {
        assert_eq!(ConnectionStatus::from_code(3), None);
        assert_eq!(ConnectionStatus::Deactivated.code(), 4);
        assert_eq!(ConnectionStatus::Cancelled.code(), 5);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!ConnectionStatus::Pending.is_terminal());
        assert!(!ConnectionStatus::Active.is_terminal());
        assert!(ConnectionStatus::Rejected.is_terminal());
        assert!(ConnectionStatus::Deactivated.is_terminal());
        assert!(ConnectionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn serde_uses_numeric_codes() {
        assert_eq!(serde_json::to_string(&ConnectionLevel::Bond).unwrap(), "4");
        let status: ConnectionStatus = serde_json::from_str("5").unwrap();
        assert_eq!(status, ConnectionStatus::Cancelled);
        assert!(serde_json::from_str::<ConnectionLevel>("9").is_err());
    }

    #[test]
    fn counterpart_resolves_either_side() {
        let c = connection(ConnectionStatus::Active, None);
        assert_eq!(c.counterpart(&"a".repeat(64)), Some("b".repeat(64).as_str()));
        assert_eq!(c.counterpart(&"b".repeat(64)), Some("a".repeat(64).as_str()));
        assert_eq!(c.counterpart(&"c".repeat(64)), None);
        assert!(c.is_sender(&"a".repeat(64)));
        assert!(!c.is_participant(&"c".repeat(64)));
    }

    #[test]
    fn expired_pending_is_not_live() {
        let c = connection(ConnectionStatus::Pending, Some(200));
        assert!(c.is_live(200));
        assert!(c.is_expired(201));
        assert!(!c.is_live(201));
    }

    #[test]
    fn expiry_ignored_once_active() {
        let c = connection(ConnectionStatus::Active, Some(200));
        assert!(!c.is_expired(1_000));
        assert!(c.is_live(1_000));
    }

    #[test]
    fn debug_shortens_pseudonyms() {
        let c = connection(ConnectionStatus::Active, None);
        let debug_str = format!("{c:?}");
        assert!(debug_str.contains("aaaaaaaa"));
        assert!(!debug_str.contains(&"a".repeat(9)));
    }
}
