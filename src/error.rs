//! Error types for exposure-core operations.
//!
//! Every failure surfaced to a caller carries an [`ErrorKind`] from a small,
//! fixed taxonomy. Internal details (SQL errors, lock poisoning) collapse
//! into [`ErrorKind::Internal`] so callers never branch on store internals.

use thiserror::Error;

use crate::pseudonym::PseudonymError;

/// Caller-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No caller identity was supplied.
    Unauthenticated,
    /// Missing or malformed request fields.
    InvalidArgument,
    /// Referenced document is absent.
    NotFound,
    /// Caller is not a participant of the referenced record.
    PermissionDenied,
    /// Stored state does not allow the operation (stale level, duplicate, missing key).
    FailedPrecondition,
    /// Duplicate connection request.
    Conflict,
    /// Store failure.
    Internal,
}

impl ErrorKind {
    /// Converts to a stable string code for the RPC boundary.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidArgument => "invalid-argument",
            Self::NotFound => "not-found",
            Self::PermissionDenied => "permission-denied",
            Self::FailedPrecondition => "failed-precondition",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

/// Error type for exposure-core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// No authenticated caller.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Invalid data provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Document not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller may not act on this record.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Operation not allowed in the current state.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// A live connection already exists between the pair.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Pseudonym derivation failed.
    #[error("Pseudonym error: {0}")]
    Pseudonym(#[from] PseudonymError),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database error from `SQLite`.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Returns the caller-facing category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Pseudonym(PseudonymError::MissingKey(_)) => ErrorKind::FailedPrecondition,
            Self::Pseudonym(PseudonymError::MissingAccount) => ErrorKind::InvalidArgument,
            Self::Pseudonym(PseudonymError::InvalidKey(_))
            | Self::Storage(_)
            | Self::Database(_)
            | Self::Serialization(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias for exposure-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
