//! End-to-end flows for the PIN authentication subsystem
//!
//! Drives the full setup / login / lockout / reset lifecycle through the
//! public orchestrator contract, with a manual clock and an in-memory
//! store so every step is deterministic.

use std::sync::Arc;
use std::time::Duration;

use hemolock_core::{
    AuthError, AuthStatus, CachedIdentity, CredentialStore, FileBackend, IdentityClaim,
    InMemoryIdentityCache, ManualClock, MemoryBackend, PinAuthenticator, SecurityPolicy,
    StaticIdentity,
};

const T0: i64 = 1_700_000_000_000;

fn cached_identity() -> CachedIdentity {
    CachedIdentity {
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        date_of_birth: "1906-12-09".into(),
        external_id: "DN-2207".into(),
    }
}

fn matching_claim() -> IdentityClaim {
    IdentityClaim {
        first_name: " grace ".into(),
        last_name: "HOPPER".into(),
        date_of_birth: "1906-12-09".into(),
        external_id: "dn-2207".into(),
    }
}

fn authenticator_on(
    backend: Arc<MemoryBackend>,
    device: &str,
    clock: &ManualClock,
) -> PinAuthenticator {
    let store = CredentialStore::new(
        backend,
        Arc::new(StaticIdentity::new(device)),
        Arc::new(clock.clone()),
    );
    PinAuthenticator::new(
        store,
        SecurityPolicy::default(),
        Arc::new(InMemoryIdentityCache::new(Some(cached_identity()))),
    )
}

/// The canonical lifecycle: three wrong PINs lock the account, the correct
/// PIN is rejected while locked, an identity-verified reset deletes the
/// record, and a fresh setup starts with an empty ledger.
#[tokio::test]
async fn test_lockout_and_reset_lifecycle() {
    let clock = ManualClock::new(T0);
    let auth = authenticator_on(Arc::new(MemoryBackend::new()), "device-a", &clock);

    let outcome = auth.setup("13579", "13579", Some("donor-1")).await.unwrap();
    assert!(outcome.durable);

    assert!(matches!(
        auth.authenticate("00000").await,
        Err(AuthError::IncorrectPin {
            attempts_remaining: 2
        })
    ));
    assert!(matches!(
        auth.authenticate("11111").await,
        Err(AuthError::IncorrectPin {
            attempts_remaining: 1
        })
    ));
    assert!(matches!(
        auth.authenticate("22222").await,
        Err(AuthError::NowLocked { .. })
    ));

    // The correct PIN is rejected as locked, not as "wrong PIN"
    assert!(matches!(
        auth.authenticate("13579").await,
        Err(AuthError::LockedOut { .. })
    ));

    auth.reset(&matching_claim()).await.unwrap();
    assert_eq!(auth.status().await, AuthStatus::NoCredential);

    let fresh = auth.setup("24680", "24680", Some("donor-1")).await.unwrap();
    assert!(fresh.durable);
    assert_eq!(
        auth.status().await,
        AuthStatus::Unlocked {
            attempts_remaining: 3
        }
    );
    assert!(auth.authenticate("24680").await.is_ok());
}

#[tokio::test]
async fn test_lockout_expires_without_explicit_unlock() {
    let clock = ManualClock::new(T0);
    let auth = authenticator_on(Arc::new(MemoryBackend::new()), "device-a", &clock);
    auth.setup("13579", "13579", Some("donor-1")).await.unwrap();

    for pin in ["00000", "11111", "22222"] {
        let _ = auth.authenticate(pin).await;
    }
    assert!(matches!(auth.status().await, AuthStatus::Locked { .. }));

    // Just short of the window: still locked
    clock.advance(Duration::from_secs(14 * 60));
    assert!(matches!(auth.status().await, AuthStatus::Locked { .. }));

    // Past the window: unlocked with full attempts, no unlock call needed
    clock.advance(Duration::from_secs(61));
    assert_eq!(
        auth.status().await,
        AuthStatus::Unlocked {
            attempts_remaining: 3
        }
    );
    assert!(auth.authenticate("13579").await.is_ok());
}

#[tokio::test]
async fn test_envelope_is_useless_on_another_device() {
    let clock = ManualClock::new(T0);
    let backend = Arc::new(MemoryBackend::new());

    let device_a = authenticator_on(Arc::clone(&backend), "device-a", &clock);
    device_a
        .setup("13579", "13579", Some("donor-1"))
        .await
        .unwrap();

    // Same persisted bytes, different device identity: no credential, and
    // the envelope is purged
    let device_b = authenticator_on(Arc::clone(&backend), "device-b", &clock);
    assert_eq!(device_b.status().await, AuthStatus::NoCredential);
    assert!(matches!(
        device_b.authenticate("13579").await,
        Err(AuthError::NoCredential)
    ));

    // The purge is physical: device A finds nothing either
    assert_eq!(device_a.status().await, AuthStatus::NoCredential);
}

#[tokio::test]
async fn test_reset_races_fail_closed() {
    let clock = ManualClock::new(T0);
    let auth = authenticator_on(Arc::new(MemoryBackend::new()), "device-a", &clock);
    auth.setup("13579", "13579", Some("donor-1")).await.unwrap();

    auth.reset(&matching_claim()).await.unwrap();

    // An authenticate after the reset sees an absent envelope
    assert!(matches!(
        auth.authenticate("13579").await,
        Err(AuthError::NoCredential)
    ));
}

#[tokio::test]
async fn test_change_pin_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let path = dir.path().join("pin_envelope.json");

    {
        let store = CredentialStore::new(
            Arc::new(FileBackend::new(path.clone())),
            Arc::new(StaticIdentity::new("device-a")),
            Arc::new(clock.clone()),
        );
        let auth = PinAuthenticator::new(
            store,
            SecurityPolicy::default(),
            Arc::new(InMemoryIdentityCache::new(Some(cached_identity()))),
        );
        auth.setup("13579", "13579", Some("donor-1")).await.unwrap();
        auth.change_pin("13579", "24680", "24680").await.unwrap();
    }

    // A new authenticator over the same file sees the changed credential
    let store = CredentialStore::new(
        Arc::new(FileBackend::new(path)),
        Arc::new(StaticIdentity::new("device-a")),
        Arc::new(clock.clone()),
    );
    let auth = PinAuthenticator::new(
        store,
        SecurityPolicy::default(),
        Arc::new(InMemoryIdentityCache::new(Some(cached_identity()))),
    );
    let success = auth.authenticate("24680").await.unwrap();
    assert_eq!(success.subject_id, "donor-1");
    assert!(matches!(
        auth.authenticate("13579").await,
        Err(AuthError::IncorrectPin { .. })
    ));
}

#[tokio::test]
async fn test_credential_expires_by_usage_age() {
    let clock = ManualClock::new(T0);
    let auth = authenticator_on(Arc::new(MemoryBackend::new()), "device-a", &clock);
    let policy = SecurityPolicy::default();
    auth.setup("13579", "13579", Some("donor-1")).await.unwrap();

    // The envelope's 30-day storage expiry lapses before the record's
    // 90-day usage expiry; either way the credential is simply gone
    clock.advance(policy.storage_expiry + Duration::from_secs(1));
    assert_eq!(auth.status().await, AuthStatus::NoCredential);
}
