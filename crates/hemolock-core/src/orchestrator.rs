//! Authentication orchestrator
//!
//! Implements the setup / login / change / reset protocols over the
//! validation engine, credential hasher, device-bound store, and attempt
//! ledger, and is the single contract the portal's UI flows consume.
//!
//! Status is derived from the store and ledger on every call, never cached.
//! All mutating operations hold a single-slot mutex for their whole
//! read-modify-write, so a double-submitted login cannot interleave a
//! ledger update. An authenticate racing a reset fails closed on its next
//! store read.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AuthError, Result};
use crate::hasher;
use crate::identity::{IdentityCache, IdentityClaim, SessionResolver, SessionToken};
use crate::lockout;
use crate::policy::SecurityPolicy;
use crate::record::{AttemptEntry, PinCredentialRecord};
use crate::store::CredentialStore;
use crate::validation;
use crate::PROVISIONAL_SUBJECT_PREFIX;

/// Derived authentication status
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    /// No credential record exists; setup is required
    NoCredential,
    /// A record exists but is logically revoked
    CredentialInactive,
    /// Ready to authenticate
    Unlocked {
        /// Attempts left before lockout
        attempts_remaining: u32,
    },
    /// Locked out until the given epoch millis
    Locked {
        /// When the lock lapses
        expires_at: i64,
    },
}

/// Successful authentication
#[derive(Clone, Debug)]
pub struct AuthSuccess {
    /// Donor the credential authenticates; the caller resolves full
    /// identity out of band
    pub subject_id: String,
    /// Backing session, when a resolver was configured and needed
    pub session: Option<SessionToken>,
}

/// Result of a setup call
#[derive(Clone, Debug)]
pub struct SetupOutcome {
    /// Subject the new credential authenticates
    pub subject_id: String,
    /// False when the envelope write failed and the credential exists only
    /// in memory for this process
    pub durable: bool,
}

/// The PIN authentication context: an explicit object, never global state.
///
/// Construct one per device (or per test, with an injectable clock and an
/// in-memory store).
pub struct PinAuthenticator {
    store: CredentialStore,
    policy: SecurityPolicy,
    identity: Arc<dyn IdentityCache>,
    resolver: Option<Arc<dyn SessionResolver>>,
    clock: Arc<dyn Clock>,
    allow_provisional: bool,
    /// Serializes every read-modify-write on the single stored record
    op_lock: Mutex<()>,
    /// Degraded in-memory record when the durable write path is down
    fallback: Mutex<Option<PinCredentialRecord>>,
}

impl PinAuthenticator {
    /// Authenticator over a store and policy, with the external identity
    /// cache collaborator
    pub fn new(
        store: CredentialStore,
        policy: SecurityPolicy,
        identity: Arc<dyn IdentityCache>,
    ) -> Self {
        let clock = store.clock();
        Self {
            store,
            policy,
            identity,
            resolver: None,
            clock,
            allow_provisional: false,
            op_lock: Mutex::new(()),
            fallback: Mutex::new(None),
        }
    }

    /// Attach the external session collaborator used to back provisional
    /// subjects with a real portal session
    pub fn with_session_resolver(mut self, resolver: Arc<dyn SessionResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Allow setup to mint `provisional:` subjects when no cached identity
    /// exists. Off by default.
    pub fn with_provisional_subjects(mut self, allow: bool) -> Self {
        self.allow_provisional = allow;
        self
    }

    /// The active policy
    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Current derived status
    pub async fn status(&self) -> AuthStatus {
        let _guard = self.op_lock.lock().await;
        self.derive_status().await
    }

    async fn derive_status(&self) -> AuthStatus {
        let Some((record, _)) = self.load_record().await else {
            return AuthStatus::NoCredential;
        };
        if !record.is_active {
            return AuthStatus::CredentialInactive;
        }
        let state = lockout::evaluate(&record.attempts, &self.policy, self.clock.now_millis());
        if state.is_locked {
            AuthStatus::Locked {
                expires_at: state.lockout_expires_at.unwrap_or_default(),
            }
        } else {
            AuthStatus::Unlocked {
                attempts_remaining: state.attempts_remaining,
            }
        }
    }

    /// Set up a new PIN credential, replacing any existing unlocked record.
    ///
    /// While the existing record is locked out, setup is refused: an
    /// identity-verified reset (or the window lapsing) is the only way past
    /// a lock, and re-running setup must not become a side door.
    ///
    /// When no subject id is supplied, the cached identity's external id is
    /// used; with provisional subjects enabled a placeholder subject is
    /// minted instead of failing.
    pub async fn setup(
        &self,
        pin: &str,
        confirm_pin: &str,
        subject_id: Option<&str>,
    ) -> Result<SetupOutcome> {
        let _guard = self.op_lock.lock().await;

        if let Some((existing, _)) = self.load_record().await {
            if existing.is_active {
                let state =
                    lockout::evaluate(&existing.attempts, &self.policy, self.clock.now_millis());
                if state.is_locked {
                    return Err(AuthError::LockedOut {
                        expires_at: state.lockout_expires_at.unwrap_or_default(),
                    });
                }
            }
        }

        if pin != confirm_pin {
            return Err(AuthError::PinMismatch);
        }
        let report = validation::validate(pin, &self.policy);
        if !report.is_valid() {
            return Err(AuthError::Validation(report));
        }

        let subject = self.resolve_setup_subject(subject_id)?;
        let record = PinCredentialRecord::new(
            hasher::hash_pin(pin),
            subject.clone(),
            self.clock.now_millis(),
        );

        let durable = self.store.put(&record, &self.policy).await;
        let mut fallback = self.fallback.lock().await;
        if durable {
            *fallback = None;
            info!("PIN credential set up for subject");
        } else {
            // Degraded mode: usable this process, but never claimed durable
            *fallback = Some(record);
            warn!("PIN credential could not be persisted; continuing in-memory only");
        }

        Ok(SetupOutcome {
            subject_id: subject,
            durable,
        })
    }

    fn resolve_setup_subject(&self, subject_id: Option<&str>) -> Result<String> {
        if let Some(subject) = subject_id {
            let trimmed = subject.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
        if let Some(identity) = self.identity.cached_identity() {
            let external = identity.external_id.trim().to_string();
            if !external.is_empty() {
                return Ok(external);
            }
        }
        if self.allow_provisional {
            let subject = format!("{PROVISIONAL_SUBJECT_PREFIX}{}", Uuid::new_v4());
            debug!("minting provisional subject for setup");
            return Ok(subject);
        }
        Err(AuthError::SubjectUnavailable)
    }

    /// Authenticate with the PIN.
    ///
    /// While locked this returns immediately without validating or hashing:
    /// a locked account has zero attack surface. Attempt outcomes are
    /// persisted before the result is returned.
    pub async fn authenticate(&self, pin: &str) -> Result<AuthSuccess> {
        let _guard = self.op_lock.lock().await;
        let now = self.clock.now_millis();

        let Some((mut record, durable)) = self.load_record().await else {
            return Err(AuthError::NoCredential);
        };
        if !record.is_active {
            return Err(AuthError::CredentialInactive);
        }

        let state = lockout::evaluate(&record.attempts, &self.policy, now);
        if state.is_locked {
            return Err(AuthError::LockedOut {
                expires_at: state.lockout_expires_at.unwrap_or(now),
            });
        }

        // Shape failures never touch the ledger; a policy-weak wrong guess
        // like 00000 is a real attempt and must burn one
        let report = validation::validate_shape(pin, &self.policy);
        if !report.is_valid() {
            return Err(AuthError::Validation(report));
        }

        let verified = hasher::verify_pin(pin, &record.credential_hash);
        record.push_attempt(AttemptEntry {
            timestamp: now,
            success: verified,
            context: None,
        });

        if !verified {
            let after = lockout::evaluate(&record.attempts, &self.policy, now);
            self.save_record(&record, durable).await;
            if after.is_locked {
                return Err(AuthError::NowLocked {
                    expires_at: after.lockout_expires_at.unwrap_or(now),
                });
            }
            return Err(AuthError::IncorrectPin {
                attempts_remaining: after.attempts_remaining,
            });
        }

        // Verified: ledger resets and the record's usage timestamp moves
        record.clear_attempts();
        record.touch(now);
        self.save_record(&record, durable).await;

        let session = self.resolve_session_if_needed(&record.subject_id).await?;
        Ok(AuthSuccess {
            subject_id: record.subject_id,
            session,
        })
    }

    async fn resolve_session_if_needed(&self, subject_id: &str) -> Result<Option<SessionToken>> {
        if !subject_id.starts_with(PROVISIONAL_SUBJECT_PREFIX) {
            return Ok(None);
        }
        let Some(resolver) = &self.resolver else {
            return Ok(None);
        };
        let cached = self.identity.cached_identity();
        match resolver.resolve_session(subject_id, cached.as_ref()).await {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!("backing session resolution failed: {e}");
                Err(AuthError::SessionUnavailable {
                    subject_id: subject_id.to_string(),
                })
            }
        }
    }

    /// Change the PIN. The caller must hold a currently unlocked,
    /// previously authenticated session.
    pub async fn change_pin(
        &self,
        current_pin: &str,
        new_pin: &str,
        confirm_new_pin: &str,
    ) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        let Some((mut record, durable)) = self.load_record().await else {
            return Err(AuthError::NoCredential);
        };
        if !record.is_active {
            return Err(AuthError::CredentialInactive);
        }

        if !hasher::verify_pin(current_pin, &record.credential_hash) {
            return Err(AuthError::CurrentPinIncorrect);
        }
        let report = validation::validate(new_pin, &self.policy);
        if !report.is_valid() {
            return Err(AuthError::Validation(report));
        }
        if new_pin == current_pin {
            return Err(AuthError::PinUnchanged);
        }
        if new_pin != confirm_new_pin {
            return Err(AuthError::PinMismatch);
        }

        // Replace the hash and clear the ledger; subject and active flag
        // are untouched
        record.credential_hash = hasher::hash_pin(new_pin);
        record.clear_attempts();
        record.touch(self.clock.now_millis());

        if durable {
            if !self.store.put(&record, &self.policy).await {
                return Err(AuthError::Storage(
                    "failed to persist changed credential".into(),
                ));
            }
        } else {
            *self.fallback.lock().await = Some(record);
        }
        info!("PIN credential changed");
        Ok(())
    }

    /// Identity-verified reset: deletes the credential and envelope
    /// entirely. The only path that clears a lockout early; it never
    /// creates a new PIN itself.
    pub async fn reset(&self, claim: &IdentityClaim) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        // A missing cache and a mismatch are indistinguishable on purpose
        let Some(cached) = self.identity.cached_identity() else {
            return Err(AuthError::IdentityMismatch);
        };
        if !claim.matches(&cached) {
            return Err(AuthError::IdentityMismatch);
        }

        self.store.clear().await;
        *self.fallback.lock().await = None;
        info!("PIN credential deleted after identity verification");
        Ok(())
    }

    async fn load_record(&self) -> Option<(PinCredentialRecord, bool)> {
        if let Some(record) = self.store.get(&self.policy).await {
            return Some((record, true));
        }
        self.fallback
            .lock()
            .await
            .clone()
            .map(|record| (record, false))
    }

    async fn save_record(&self, record: &PinCredentialRecord, durable: bool) {
        if durable && self.store.put(record, &self.policy).await {
            return;
        }
        if durable {
            warn!("credential write failed; keeping in-memory copy");
        }
        *self.fallback.lock().await = Some(record.clone());
    }
}
