//! Device identity collaborator
//!
//! The store binds encrypted material to an opaque, stable per-installation
//! value. A changed identity is treated as a new device: the old envelope
//! becomes unreadable and is purged, never migrated.

use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::Result;

/// Stable opaque identity for the current device/installation
pub trait DeviceIdentity: Send + Sync {
    /// The current device id. Deterministic per installation, but the core
    /// tolerates it changing (fail closed, purge).
    fn device_id(&self) -> Result<String>;
}

/// Fixed identity for tests and embedders that manage their own id
#[derive(Clone, Debug)]
pub struct StaticIdentity {
    id: String,
}

impl StaticIdentity {
    /// Wrap an externally supplied device id
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl DeviceIdentity for StaticIdentity {
    fn device_id(&self) -> Result<String> {
        Ok(self.id.clone())
    }
}

/// File-persisted random identity, minted on first use.
///
/// The id file is written atomically with 0600 permissions, matching the
/// credential envelope's storage discipline.
#[derive(Clone, Debug)]
pub struct InstallationIdentity {
    path: PathBuf,
}

impl InstallationIdentity {
    /// Identity backed by the given file path
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl DeviceIdentity for InstallationIdentity {
    fn device_id(&self) -> Result<String> {
        if self.path.exists() {
            let existing = fs::read_to_string(&self.path)?;
            let trimmed = existing.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }

        let id = Uuid::new_v4().to_string();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &id)?;
        fs::rename(&temp_path, &self.path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(id)
    }
}

/// Lightweight binding tag for a device id: hex SHA-256.
///
/// Stored next to the ciphertext so a foreign-device envelope is detected
/// and purged without attempting decryption.
pub fn binding_tag(device_id: &str) -> String {
    hex::encode(Sha256::digest(device_id.as_bytes()))
}
