//! External identity collaborators
//!
//! The identity cache is populated by the registration flow and is strictly
//! read-only here; reset consumes it to verify a donor before deleting the
//! credential. The session resolver maps a locally verified subject to a
//! backing portal session.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Cached registration snapshot from the external identity flow
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedIdentity {
    /// Donor first name
    pub first_name: String,
    /// Donor last name
    pub last_name: String,
    /// Date of birth as entered at registration
    pub date_of_birth: String,
    /// External donor identifier
    pub external_id: String,
}

/// Caller-supplied identity claim for PIN reset
#[derive(Clone, Debug)]
pub struct IdentityClaim {
    /// Claimed first name
    pub first_name: String,
    /// Claimed last name
    pub last_name: String,
    /// Claimed date of birth
    pub date_of_birth: String,
    /// Claimed external identifier
    pub external_id: String,
}

impl IdentityClaim {
    /// Field-for-field comparison against the cached snapshot,
    /// case-insensitive and whitespace-trimmed. The caller must never learn
    /// which field failed.
    pub fn matches(&self, cached: &CachedIdentity) -> bool {
        fields_match(&self.first_name, &cached.first_name)
            && fields_match(&self.last_name, &cached.last_name)
            && fields_match(&self.date_of_birth, &cached.date_of_birth)
            && fields_match(&self.external_id, &cached.external_id)
    }
}

fn fields_match(claimed: &str, cached: &str) -> bool {
    claimed.trim().to_lowercase() == cached.trim().to_lowercase()
}

/// Read-only access to the cached registration identity
pub trait IdentityCache: Send + Sync {
    /// The cached snapshot, if the registration flow populated one
    fn cached_identity(&self) -> Option<CachedIdentity>;
}

/// Fixed snapshot for tests and embedders
#[derive(Clone, Debug, Default)]
pub struct InMemoryIdentityCache {
    identity: Option<CachedIdentity>,
}

impl InMemoryIdentityCache {
    /// Cache holding the given snapshot (or none)
    pub fn new(identity: Option<CachedIdentity>) -> Self {
        Self { identity }
    }
}

impl IdentityCache for InMemoryIdentityCache {
    fn cached_identity(&self) -> Option<CachedIdentity> {
        self.identity.clone()
    }
}

/// JSON-file snapshot written by the registration flow
#[derive(Clone, Debug)]
pub struct FileIdentityCache {
    path: PathBuf,
}

impl FileIdentityCache {
    /// Cache backed by the given file path
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl IdentityCache for FileIdentityCache {
    fn cached_identity(&self) -> Option<CachedIdentity> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(identity) => Some(identity),
            Err(e) => {
                debug!("identity cache unreadable: {e}");
                None
            }
        }
    }
}

/// Opaque backing-session handle issued by the portal
#[derive(Clone, Debug)]
pub struct SessionToken {
    /// Subject the session was established for
    pub subject_id: String,
    /// Opaque session material
    pub token: String,
}

/// External collaborator that turns a locally verified subject into a
/// backing portal session
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Resolve a session for the subject, consulting the cached identity
    /// when the subject id is provisional
    async fn resolve_session(
        &self,
        subject_id: &str,
        identity: Option<&CachedIdentity>,
    ) -> Result<SessionToken>;
}
