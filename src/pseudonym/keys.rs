//! Per-domain secret keys for pseudonym derivation.
//!
//! Each pseudonym domain has an independent HMAC key. Keys are held in
//! zeroizing buffers and never appear in `Debug` output.
//!
//! # Key sources
//!
//! [`PseudonymKeys::from_env`] reads, for every domain:
//! - `EXPOSURE_KEY_<DOMAIN>_FILE` (path to a file holding the hex key)
//! - `EXPOSURE_KEY_<DOMAIN>` (hex key inline)
//!
//! The file source takes precedence. A domain with neither source is simply
//! left unprovisioned; deriving for it later fails with
//! [`PseudonymError::MissingKey`].

use std::collections::HashMap;

use zeroize::Zeroizing;

use super::error::PseudonymError;
use super::PseudonymDomain;

/// Minimum accepted key length in bytes.
pub const MIN_KEY_LEN: usize = 32;

/// Environment variable prefix for key sources.
const KEY_ENV_PREFIX: &str = "EXPOSURE_KEY_";

/// Process-wide set of per-domain pseudonym secrets.
#[derive(Clone, Default)]
pub struct PseudonymKeys {
    keys: HashMap<PseudonymDomain, Zeroizing<Vec<u8>>>,
}

impl std::fmt::Debug for PseudonymKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut provisioned: Vec<&str> = self.keys.keys().map(PseudonymDomain::as_str).collect();
        provisioned.sort_unstable();
        f.debug_struct("PseudonymKeys")
            .field("provisioned", &provisioned)
            .field("keys", &"<redacted>")
            .finish()
    }
}

impl PseudonymKeys {
    /// Creates an empty key set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key for a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is shorter than [`MIN_KEY_LEN`].
    pub fn with_key(
        mut self,
        domain: PseudonymDomain,
        key: impl Into<Vec<u8>>,
    ) -> Result<Self, PseudonymError> {
        let key = Zeroizing::new(key.into());
        if key.len() < MIN_KEY_LEN {
            return Err(PseudonymError::InvalidKey(format!(
                "{domain} key must be at least {MIN_KEY_LEN} bytes"
            )));
        }
        self.keys.insert(domain, key);
        Ok(self)
    }

    /// Adds a hex-encoded key for a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the hex is malformed or the key is too short.
    pub fn with_hex_key(
        self,
        domain: PseudonymDomain,
        hex_key: &str,
    ) -> Result<Self, PseudonymError> {
        let bytes = Zeroizing::new(
            hex::decode(hex_key.trim())
                .map_err(|e| PseudonymError::InvalidKey(format!("{domain} key: {e}")))?,
        );
        self.with_key(domain, bytes.to_vec())
    }

    /// Loads keys from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured source is unreadable or malformed.
    pub fn from_env() -> Result<Self, PseudonymError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads keys through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured source is unreadable or malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PseudonymError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut keys = Self::new();
        for domain in PseudonymDomain::ALL {
            let var = format!("{KEY_ENV_PREFIX}{}", domain.as_str().to_uppercase());

            let hex_key = if let Some(path) = lookup(&format!("{var}_FILE")) {
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    PseudonymError::InvalidKey(format!("failed to read {var}_FILE: {e}"))
                })?;
                Some(Zeroizing::new(contents))
            } else {
                lookup(&var).map(Zeroizing::new)
            };

            if let Some(hex_key) = hex_key {
                keys = keys.with_hex_key(domain, &hex_key)?;
            }
        }
        tracing::debug!(?keys, "loaded pseudonym keys");
        Ok(keys)
    }

    /// Returns the key for a domain, if provisioned.
    #[must_use]
    pub fn get(&self, domain: PseudonymDomain) -> Option<&[u8]> {
        self.keys.get(&domain).map(|k| k.as_slice())
    }

    /// Returns whether a key is provisioned for the domain.
    #[must_use]
    pub fn has(&self, domain: PseudonymDomain) -> bool {
        self.keys.contains_key(&domain)
    }
}
