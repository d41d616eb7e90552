//! Attempt ledger and lockout evaluation
//!
//! Lockout is never stored: it is recomputed on demand from the attempt
//! history filtered to a trailing wall-clock window. A lapsed window means
//! the lock expired naturally; there is no explicit unlock call, and no
//! counter that could be raced down by retrying quickly.

use std::sync::Arc;

use crate::clock::Clock;
use crate::policy::SecurityPolicy;
use crate::record::{AttemptEntry, PinCredentialRecord};
use crate::store::CredentialStore;

/// Derived lockout state (never persisted)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockoutState {
    /// Whether the account is currently locked
    pub is_locked: bool,
    /// Attempts left before lockout (0 while locked)
    pub attempts_remaining: u32,
    /// When the lock lapses, if locked (epoch millis)
    pub lockout_expires_at: Option<i64>,
}

impl LockoutState {
    fn unlocked(attempts_remaining: u32) -> Self {
        Self {
            is_locked: false,
            attempts_remaining,
            lockout_expires_at: None,
        }
    }
}

/// Evaluate lockout from an attempt history at the given wall-clock time.
///
/// Failures strictly inside the trailing window count toward the threshold;
/// the lock expires `lockout_window` after the last qualifying failure.
/// Stale failures stay in the ledger but stop counting once the window
/// moves past them.
///
/// The filter is strict so a failure stops counting at the same instant its
/// lock would lapse: at exactly `lockout_expires_at` the state is unlocked
/// with full attempts remaining.
pub fn evaluate(attempts: &[AttemptEntry], policy: &SecurityPolicy, now: i64) -> LockoutState {
    let window = policy.lockout_window_millis();
    let window_start = now - window;

    let failures: Vec<&AttemptEntry> = attempts
        .iter()
        .filter(|a| !a.success && a.timestamp > window_start)
        .collect();

    if failures.len() as u32 >= policy.max_attempts {
        // Any qualifying failure satisfies timestamp + window > now, so
        // the lock is always still active here
        if let Some(last) = failures.last() {
            return LockoutState {
                is_locked: true,
                attempts_remaining: 0,
                lockout_expires_at: Some(last.timestamp + window),
            };
        }
    }

    LockoutState::unlocked(policy.max_attempts - failures.len() as u32)
}

/// Store-backed attempt ledger over the single credential record
#[derive(Clone)]
pub struct AttemptLedger {
    store: CredentialStore,
    clock: Arc<dyn Clock>,
}

impl AttemptLedger {
    /// Ledger over the given store, sharing its clock
    pub fn new(store: CredentialStore) -> Self {
        let clock = store.clock();
        Self { store, clock }
    }

    /// Append an attempt to the record, truncating to the history cap.
    /// Returns `false` when no record exists or the write fails.
    pub async fn record_attempt(
        &self,
        success: bool,
        context: Option<String>,
        policy: &SecurityPolicy,
    ) -> bool {
        let Some(mut record) = self.store.get(policy).await else {
            return false;
        };
        record.push_attempt(AttemptEntry {
            timestamp: self.clock.now_millis(),
            success,
            context,
        });
        self.store.put(&record, policy).await
    }

    /// Current lockout state; a missing record reports fully unlocked
    pub async fn evaluate_lockout(&self, policy: &SecurityPolicy) -> LockoutState {
        match self.store.get(policy).await {
            Some(record) => evaluate(&record.attempts, policy, self.clock.now_millis()),
            None => LockoutState::unlocked(policy.max_attempts),
        }
    }

    /// Clear the attempt history. Called only after a verified successful
    /// authentication or an identity-verified reset.
    pub async fn reset(&self, policy: &SecurityPolicy) -> bool {
        let Some(mut record) = self.store.get(policy).await else {
            return false;
        };
        record.clear_attempts();
        self.store.put(&record, policy).await
    }

    /// Read-only view of the underlying record, if any
    pub async fn current_record(&self, policy: &SecurityPolicy) -> Option<PinCredentialRecord> {
        self.store.get(policy).await
    }
}
