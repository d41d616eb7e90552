//! The durable credential record and its attempt history

use serde::{Deserialize, Serialize};

/// Attempt entries kept per record; older entries are dropped
pub const MAX_ATTEMPT_HISTORY: usize = 10;

/// One authentication attempt, immutable once appended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptEntry {
    /// Epoch millis of the attempt
    pub timestamp: i64,
    /// Whether the PIN verified
    pub success: bool,
    /// Optional caller-supplied context (e.g. originating flow)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// The single durable secret record per device
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinCredentialRecord {
    /// Opaque salt + derived-key credential string (see `hasher`)
    pub credential_hash: String,
    /// Epoch millis at creation
    pub created_at: i64,
    /// Epoch millis of last successful use; never before `created_at`
    pub last_used_at: i64,
    /// Attempt history, newest last, capped at `MAX_ATTEMPT_HISTORY`
    pub attempts: Vec<AttemptEntry>,
    /// False means logically revoked even if physically present
    pub is_active: bool,
    /// Donor this record authenticates; may be provisional
    pub subject_id: String,
}

impl PinCredentialRecord {
    /// Fresh active record with an empty ledger
    pub fn new(credential_hash: String, subject_id: String, now: i64) -> Self {
        Self {
            credential_hash,
            created_at: now,
            last_used_at: now,
            attempts: Vec::new(),
            is_active: true,
            subject_id,
        }
    }

    /// Append an attempt, dropping the oldest beyond the history cap
    pub fn push_attempt(&mut self, entry: AttemptEntry) {
        self.attempts.push(entry);
        if self.attempts.len() > MAX_ATTEMPT_HISTORY {
            let excess = self.attempts.len() - MAX_ATTEMPT_HISTORY;
            self.attempts.drain(..excess);
        }
    }

    /// Clear the attempt ledger
    pub fn clear_attempts(&mut self) {
        self.attempts.clear();
    }

    /// Record a successful use, keeping `last_used_at >= created_at`
    pub fn touch(&mut self, now: i64) {
        self.last_used_at = self.last_used_at.max(now).max(self.created_at);
    }
}
