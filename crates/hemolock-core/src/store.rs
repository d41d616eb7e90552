//! Device-bound encrypted storage for the credential record
//!
//! Exactly one record is persisted per device, wrapped in an
//! `EncryptedEnvelope` that only this module ever sees. The record is
//! serialized as JSON and encrypted with ChaCha20-Poly1305 under a key
//! derived from the device identity, so the raw persisted bytes are useless
//! on any other device.
//!
//! # Ciphertext Layout
//!
//! The envelope's `ciphertext` field is base64 over:
//! - 16-byte KDF salt
//! - 12-byte nonce
//! - ciphertext + 16-byte authentication tag
//!
//! # Failure Discipline
//!
//! Every read-path failure (unknown schema, expired, foreign device, AEAD
//! failure, stale record) purges the envelope and reports "no credential".
//! Write failures log and return `false`; they never propagate.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::clock::Clock;
use crate::device::{binding_tag, DeviceIdentity};
use crate::error::{AuthError, Result};
use crate::policy::SecurityPolicy;
use crate::record::PinCredentialRecord;

/// Envelope schema version; unrecognized versions are purged on read
const SCHEMA_VERSION: &str = "1";

const KDF_SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
/// Storage KDF iteration count, independent of the credential hasher's KDF
const STORAGE_KDF_ITERATIONS: u32 = 100_000;

/// On-device persisted wrapper around the encrypted record.
/// Owned exclusively by this module.
#[derive(Debug, Serialize, Deserialize)]
struct EncryptedEnvelope {
    /// base64(salt || nonce || ciphertext)
    ciphertext: String,
    /// Lightweight hash of the device identity (see `device::binding_tag`)
    device_binding_tag: String,
    /// Epoch millis at write time
    stored_at: i64,
    /// Epoch millis after which the envelope is treated as absent
    expires_at: i64,
    /// Format version for migrations
    schema_version: String,
}

/// Raw persistence for envelope bytes
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the stored envelope bytes, `None` if absent
    async fn load(&self) -> Result<Option<Vec<u8>>>;
    /// Replace the stored envelope bytes
    async fn store(&self, bytes: &[u8]) -> Result<()>;
    /// Delete the stored envelope; idempotent
    async fn remove(&self) -> Result<()>;
}

/// File-backed envelope storage with atomic writes and 0600 permissions
#[derive(Clone, Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Store the envelope at the given path
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn load(&self) -> Result<Option<Vec<u8>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(&self.path)?))
    }

    async fn store(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &self.path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory single-slot backend for tests
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slot: Mutex<Option<Vec<u8>>>,
}

impl MemoryBackend {
    /// Empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.slot.lock().expect("backend poisoned").clone())
    }

    async fn store(&self, bytes: &[u8]) -> Result<()> {
        *self.slot.lock().expect("backend poisoned") = Some(bytes.to_vec());
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        *self.slot.lock().expect("backend poisoned") = None;
        Ok(())
    }
}

/// Device-bound store holding at most one credential record
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn StorageBackend>,
    device: Arc<dyn DeviceIdentity>,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    /// Build a store over a backend, device identity, and clock
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        device: Arc<dyn DeviceIdentity>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            device,
            clock,
        }
    }

    /// The store's clock (shared with the orchestrator and ledger)
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Encrypt and persist the record. Returns `false` on any cryptographic
    /// or IO error; never propagates one.
    pub async fn put(&self, record: &PinCredentialRecord, policy: &SecurityPolicy) -> bool {
        match self.try_put(record, policy).await {
            Ok(()) => true,
            Err(e) => {
                warn!("credential envelope write failed: {e}");
                false
            }
        }
    }

    async fn try_put(&self, record: &PinCredentialRecord, policy: &SecurityPolicy) -> Result<()> {
        let device_id = self.device.device_id()?;

        let mut salt = [0u8; KDF_SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let key = derive_storage_key(&device_id, &salt);
        let cipher = ChaCha20Poly1305::new_from_slice(key.as_ref())
            .map_err(|e| AuthError::Crypto(format!("invalid storage key: {e}")))?;

        let plaintext = serde_json::to_vec(record)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|e| AuthError::Crypto(format!("envelope encryption failed: {e}")))?;

        let mut blob = Vec::with_capacity(KDF_SALT_LEN + NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        let now = self.clock.now_millis();
        let envelope = EncryptedEnvelope {
            ciphertext: BASE64.encode(blob),
            device_binding_tag: binding_tag(&device_id),
            stored_at: now,
            expires_at: now + policy.storage_expiry_millis(),
            schema_version: SCHEMA_VERSION.to_string(),
        };

        self.backend.store(&serde_json::to_vec(&envelope)?).await
    }

    /// Read, check, and decrypt the stored record.
    ///
    /// Any envelope that is expired, version-unknown, bound to a different
    /// device, undecryptable, or wrapping a stale record is purged and
    /// reported as absent.
    pub async fn get(&self, policy: &SecurityPolicy) -> Option<PinCredentialRecord> {
        let bytes = match self.backend.load().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("credential envelope read failed: {e}");
                return None;
            }
        };

        let Ok(envelope) = serde_json::from_slice::<EncryptedEnvelope>(&bytes) else {
            return self.purge("unparseable envelope").await;
        };
        if envelope.schema_version != SCHEMA_VERSION {
            return self.purge("unrecognized envelope schema").await;
        }

        let now = self.clock.now_millis();
        if now > envelope.expires_at {
            return self.purge("envelope storage expiry lapsed").await;
        }

        let device_id = match self.device.device_id() {
            Ok(id) => id,
            Err(e) => {
                // Cannot establish the current device; fail closed without
                // destroying an envelope that may still be valid here.
                warn!("device identity unavailable: {e}");
                return None;
            }
        };
        if envelope.device_binding_tag != binding_tag(&device_id) {
            return self.purge("envelope bound to a different device").await;
        }

        let Ok(blob) = BASE64.decode(&envelope.ciphertext) else {
            return self.purge("corrupt envelope ciphertext").await;
        };
        if blob.len() < KDF_SALT_LEN + NONCE_LEN {
            return self.purge("truncated envelope ciphertext").await;
        }
        let (salt, rest) = blob.split_at(KDF_SALT_LEN);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

        let key = derive_storage_key(&device_id, salt);
        let Ok(cipher) = ChaCha20Poly1305::new_from_slice(key.as_ref()) else {
            return self.purge("invalid storage key").await;
        };
        let Ok(plaintext) = cipher.decrypt(Nonce::from_slice(nonce_bytes), ciphertext) else {
            return self.purge("envelope authentication failed").await;
        };

        let Ok(record) = serde_json::from_slice::<PinCredentialRecord>(&plaintext) else {
            return self.purge("unparseable credential record").await;
        };
        if now - record.created_at > policy.credential_expiry_millis() {
            return self.purge("credential usage expiry lapsed").await;
        }

        Some(record)
    }

    /// Unconditionally delete the envelope. Idempotent.
    pub async fn clear(&self) {
        if let Err(e) = self.backend.remove().await {
            warn!("credential envelope delete failed: {e}");
        }
    }

    async fn purge(&self, reason: &str) -> Option<PinCredentialRecord> {
        debug!("purging credential envelope: {reason}");
        self.clear().await;
        None
    }
}

/// Per-write symmetric key from the device identity. Independent KDF
/// instance from the credential hasher's, at a higher iteration count.
fn derive_storage_key(device_id: &str, salt: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha256>(
        device_id.as_bytes(),
        salt,
        STORAGE_KDF_ITERATIONS,
        &mut *key,
    );
    key
}
