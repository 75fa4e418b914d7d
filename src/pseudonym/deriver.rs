//! One-way pseudonym derivation.
//!
//! ```text
//! accountId ──HMAC(standardKey)──▶ standard pseudonym (SUUID)
//!                                        │
//!              ┌──────────┬──────────┬───┴──────┬──────────────┐
//!              ▼          ▼          ▼          ▼              ▼
//!           profile    health      test     exposure      membership
//!        HMAC(domainKey[d], SUUID) for each domain d
//! ```
//!
//! Every output is the lowercase hex of an HMAC-SHA256 tag.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::error::PseudonymError;
use super::keys::PseudonymKeys;
use super::PseudonymDomain;

type HmacSha256 = Hmac<Sha256>;

/// Number of hex characters kept by [`short`].
const SHORT_LEN: usize = 8;

/// Derives domain pseudonyms from account identifiers.
///
/// Stateless apart from the immutable key set. Safe to share across threads.
#[derive(Debug, Clone)]
pub struct PseudonymDeriver {
    keys: PseudonymKeys,
}

impl PseudonymDeriver {
    /// Creates a deriver over the given key set.
    #[must_use]
    pub const fn new(keys: PseudonymKeys) -> Self {
        Self { keys }
    }

    /// Derives a pseudonym for `domain`.
    ///
    /// For [`PseudonymDomain::Standard`] the account id is required. For any
    /// other domain a caller already holding the standard pseudonym may pass it
    /// as `known_standard` to skip re-deriving it from the account id.
    ///
    /// # Errors
    ///
    /// Returns [`PseudonymError::MissingKey`] if a required key is not
    /// provisioned, or [`PseudonymError::MissingAccount`] if no usable input
    /// was supplied.
    pub fn derive(
        &self,
        domain: PseudonymDomain,
        account_id: Option<&str>,
        known_standard: Option<&str>,
    ) -> Result<String, PseudonymError> {
        if domain == PseudonymDomain::Standard {
            let account_id = account_id.ok_or(PseudonymError::MissingAccount)?;
            return self.standard(account_id);
        }

        match (known_standard, account_id) {
            (Some(standard), _) => self.for_standard(domain, standard),
            (None, Some(account_id)) => {
                let standard = self.standard(account_id)?;
                self.for_standard(domain, &standard)
            }
            (None, None) => Err(PseudonymError::MissingAccount),
        }
    }

    /// Derives the standard pseudonym for an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the standard key is not provisioned.
    pub fn standard(&self, account_id: &str) -> Result<String, PseudonymError> {
        self.mac(PseudonymDomain::Standard, account_id.as_bytes())
    }

    /// Derives a domain pseudonym from a standard pseudonym.
    ///
    /// Passing [`PseudonymDomain::Standard`] returns the input unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain key is not provisioned.
    pub fn for_standard(
        &self,
        domain: PseudonymDomain,
        standard: &str,
    ) -> Result<String, PseudonymError> {
        if domain == PseudonymDomain::Standard {
            return Ok(standard.to_string());
        }
        self.mac(domain, standard.as_bytes())
    }

    /// Re-keys an existing pseudonym under the domain key.
    ///
    /// Used to detach terminal records from the pseudonym they were filed
    /// under so later lookups by that pseudonym no longer match them.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain key is not provisioned.
    pub fn rehash(
        &self,
        domain: PseudonymDomain,
        pseudonym: &str,
    ) -> Result<String, PseudonymError> {
        self.mac(domain, pseudonym.as_bytes())
    }

    /// Returns whether a key is provisioned for the domain.
    #[must_use]
    pub fn supports(&self, domain: PseudonymDomain) -> bool {
        self.keys.has(domain)
    }

    fn mac(&self, domain: PseudonymDomain, data: &[u8]) -> Result<String, PseudonymError> {
        let key = self
            .keys
            .get(domain)
            .ok_or(PseudonymError::MissingKey(domain))?;
        let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|e| PseudonymError::InvalidKey(e.to_string()))?;
        mac.update(data);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Compares two pseudonyms in constant time.
#[must_use]
pub fn pseudonyms_match(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Returns a log-safe prefix of a pseudonym.
#[must_use]
pub fn short(pseudonym: &str) -> &str {
    pseudonym.get(..SHORT_LEN).unwrap_or(pseudonym)
}
