//! Hemolock Core - Local PIN authentication for the donor portal
//!
//! Returning donors unlock the portal with a short numeric PIN instead of
//! re-entering their full identity every visit. This crate is the whole of
//! that subsystem:
//! - PIN shape and policy validation with a UX strength score
//! - PBKDF2 credential hashing with constant-time verification
//! - A device-bound encrypted store for the single credential record
//! - An attempt ledger and wall-clock lockout evaluation
//! - The setup / login / change / identity-verified reset protocols
//!
//! # Security Model
//!
//! - The credential hash is salted PBKDF2-HMAC-SHA256, never the raw PIN
//! - The record is encrypted at rest with ChaCha20-Poly1305 under a key
//!   derived from the device identity, so copied envelope bytes are useless
//!   on another device
//! - Any unreadable, expired, or foreign-device envelope is purged and
//!   treated as "no credential" - the store fails closed
//! - Lockout is derived from wall-clock time on every evaluation; it cannot
//!   be raced down by retrying quickly
//!
//! This is a local convenience boundary, not a server-verified secret store.

pub mod clock;
pub mod device;
pub mod error;
pub mod hasher;
pub mod identity;
pub mod lockout;
pub mod orchestrator;
pub mod policy;
pub mod record;
pub mod store;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use device::{binding_tag, DeviceIdentity, InstallationIdentity, StaticIdentity};
pub use error::{AuthError, Result};
pub use identity::{
    CachedIdentity, FileIdentityCache, IdentityCache, IdentityClaim, InMemoryIdentityCache,
    SessionResolver, SessionToken,
};
pub use lockout::{AttemptLedger, LockoutState};
pub use orchestrator::{AuthStatus, AuthSuccess, PinAuthenticator, SetupOutcome};
pub use policy::SecurityPolicy;
pub use record::{AttemptEntry, PinCredentialRecord, MAX_ATTEMPT_HISTORY};
pub use store::{CredentialStore, FileBackend, MemoryBackend, StorageBackend};
pub use validation::{
    strength_score, validate, validate_shape, ValidationError, ValidationReport, ValidationWarning,
};

/// Prefix marking a subject id that has no backing donor account yet.
pub const PROVISIONAL_SUBJECT_PREFIX: &str = "provisional:";
