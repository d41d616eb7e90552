//! Security policy configuration for PIN authentication
//!
//! One policy object drives validation, lockout, and both expiry windows.
//! The envelope's storage expiry is deliberately shorter than the record's
//! usage expiry so the coarse time-since-write window lapses first.

use std::time::Duration;

/// Configuration for the PIN subsystem (not per-record data)
#[derive(Clone, Debug)]
pub struct SecurityPolicy {
    /// Required PIN length in digits
    pub pin_length: usize,
    /// Failed attempts within the lockout window before locking
    pub max_attempts: u32,
    /// Trailing window over which failures are counted
    pub lockout_window: Duration,
    /// Usage-based record expiry (from `created_at`)
    pub credential_expiry: Duration,
    /// Time-since-write envelope expiry
    pub storage_expiry: Duration,
    /// Allow monotonic runs like 12345 / 54321
    pub allow_sequential: bool,
    /// Allow all-identical digits like 77777
    pub allow_repeated: bool,
}

const DAY: u64 = 24 * 60 * 60;

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            pin_length: 5,
            max_attempts: 3,
            lockout_window: Duration::from_secs(15 * 60),
            credential_expiry: Duration::from_secs(90 * DAY),
            storage_expiry: Duration::from_secs(30 * DAY),
            allow_sequential: false,
            allow_repeated: false,
        }
    }
}

impl SecurityPolicy {
    /// Stricter settings for shared or kiosk devices
    pub fn strict() -> Self {
        Self {
            max_attempts: 3,
            lockout_window: Duration::from_secs(30 * 60),
            credential_expiry: Duration::from_secs(30 * DAY),
            storage_expiry: Duration::from_secs(14 * DAY),
            ..Self::default()
        }
    }

    /// More forgiving settings for development
    pub fn lenient() -> Self {
        Self {
            max_attempts: 5,
            lockout_window: Duration::from_secs(5 * 60),
            allow_sequential: true,
            allow_repeated: true,
            ..Self::default()
        }
    }

    /// Lockout window in epoch-millis units
    pub fn lockout_window_millis(&self) -> i64 {
        self.lockout_window.as_millis() as i64
    }

    /// Record usage expiry in epoch-millis units
    pub fn credential_expiry_millis(&self) -> i64 {
        self.credential_expiry.as_millis() as i64
    }

    /// Envelope storage expiry in epoch-millis units
    pub fn storage_expiry_millis(&self) -> i64 {
        self.storage_expiry.as_millis() as i64
    }
}
