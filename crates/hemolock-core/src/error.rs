//! Error types for the PIN authentication subsystem

use thiserror::Error;

use crate::validation::ValidationReport;

/// Result type alias for authentication operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors surfaced across the subsystem's public boundary.
///
/// Read-path storage and crypto failures never appear here: the store purges
/// the envelope and the caller sees `NoCredential`, so nothing leaks about
/// *why* a stored credential became unreadable.
#[derive(Debug, Error)]
pub enum AuthError {
    /// PIN failed shape or policy validation (never touches the ledger)
    #[error("PIN validation failed: {0}")]
    Validation(ValidationReport),

    /// PIN and confirmation do not match
    #[error("PINs do not match")]
    PinMismatch,

    /// New PIN is identical to the current one
    #[error("New PIN must differ from the current PIN")]
    PinUnchanged,

    /// Current PIN supplied to a change operation is wrong
    #[error("Current PIN is incorrect")]
    CurrentPinIncorrect,

    /// No credential record exists on this device
    #[error("No PIN is set up on this device")]
    NoCredential,

    /// A record exists but has been logically revoked
    #[error("PIN credential has been revoked")]
    CredentialInactive,

    /// Account is locked; only an identity-verified reset clears this early
    #[error("Account locked; try again after {expires_at}")]
    LockedOut {
        /// Epoch millis at which the lock lapses on its own
        expires_at: i64,
    },

    /// Wrong PIN, attempts still remaining
    #[error("Incorrect PIN ({attempts_remaining} attempts remaining)")]
    IncorrectPin {
        /// Attempts left before lockout
        attempts_remaining: u32,
    },

    /// Wrong PIN, and this attempt crossed the lockout threshold
    #[error("Incorrect PIN; account locked until {expires_at}")]
    NowLocked {
        /// Epoch millis at which the lock lapses
        expires_at: i64,
    },

    /// Identity claim did not match the cached registration snapshot.
    /// Deliberately field-agnostic.
    #[error("Identity verification failed")]
    IdentityMismatch,

    /// Setup could not determine a subject id for the new credential
    #[error("No subject identity available for setup")]
    SubjectUnavailable,

    /// PIN verified locally but no backing session could be established
    #[error("PIN verified locally, but no backing session could be established")]
    SessionUnavailable {
        /// Subject the credential authenticated
        subject_id: String,
    },

    /// Durable write failed (setup/change write path only)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Key derivation or cipher failure on a write path
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
