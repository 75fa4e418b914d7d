//! Error types for pseudonym derivation.

use thiserror::Error;

use super::PseudonymDomain;

/// Errors that can occur while deriving pseudonyms.
#[derive(Error, Debug)]
pub enum PseudonymError {
    /// No key is provisioned for the requested domain.
    #[error("No pseudonym key configured for domain: {0}")]
    MissingKey(PseudonymDomain),

    /// Neither an account id nor a standard pseudonym was supplied.
    #[error("An account id is required to derive this pseudonym")]
    MissingAccount,

    /// Key material is unusable (bad hex, unreadable file, too short).
    #[error("Invalid pseudonym key: {0}")]
    InvalidKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_display() {
        let err = PseudonymError::MissingKey(PseudonymDomain::Exposure);
        assert_eq!(
            err.to_string(),
            "No pseudonym key configured for domain: exposure"
        );
    }

    #[test]
    fn invalid_key_display() {
        let err = PseudonymError::InvalidKey("too short".to_string());
        assert_eq!(err.to_string(), "Invalid pseudonym key: too short");
    }
}
