//! Pseudonym derivation.
//!
//! Every user is represented only by one-way pseudonyms derived from their
//! account identifier. The standard pseudonym is the root; each domain
//! pseudonym is keyed independently so pseudonyms of the same user are
//! unlinkable across domains without every key.
//!
//! # Privacy Model
//!
//! - The account identifier is never stored in any domain document
//! - The standard pseudonym is only stored in `connections`
//! - Health, test, exposure and membership documents each use their own domain

mod deriver;
mod error;
mod keys;

pub use deriver::{pseudonyms_match, short, PseudonymDeriver};
pub use error::PseudonymError;
pub use keys::{PseudonymKeys, MIN_KEY_LEN};

use serde::{Deserialize, Serialize};

/// A pseudonym domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PseudonymDomain {
    /// Root pseudonym derived from the account id.
    Standard,
    /// Profile identity (display data).
    Profile,
    /// Health-status identity.
    Health,
    /// Test-history identity.
    Test,
    /// Exposure-alert identity.
    Exposure,
    /// Membership identity.
    Membership,
}

impl PseudonymDomain {
    /// All domains, standard first.
    pub const ALL: [Self; 6] = [
        Self::Standard,
        Self::Profile,
        Self::Health,
        Self::Test,
        Self::Exposure,
        Self::Membership,
    ];

    /// Converts to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Profile => "profile",
            Self::Health => "health",
            Self::Test => "test",
            Self::Exposure => "exposure",
            Self::Membership => "membership",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(Self::Standard),
            "profile" => Some(Self::Profile),
            "health" => Some(Self::Health),
            "test" => Some(Self::Test),
            "exposure" => Some(Self::Exposure),
            "membership" => Some(Self::Membership),
            _ => None,
        }
    }
}

impl std::fmt::Display for PseudonymDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
