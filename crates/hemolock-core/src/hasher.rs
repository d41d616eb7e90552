//! PIN credential hashing
//!
//! A credential hash is base64(salt || derived_key): a fresh 16-byte salt
//! and a 32-byte PBKDF2-HMAC-SHA256 key at a fixed iteration count. The
//! encoded string is opaque to every other module.
//!
//! Verification re-derives and compares in constant time; a malformed
//! credential string is a verification failure, never an error.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;
/// Derived key length in bytes
pub const DERIVED_KEY_LEN: usize = 32;
/// Fixed PBKDF2 iteration count for credential hashing
pub const PBKDF2_ITERATIONS: u32 = 10_000;

/// Hash a PIN into a storable, non-reversible credential string
pub fn hash_pin(pin: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let mut key = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    pbkdf2_hmac::<Sha256>(pin.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut *key);

    let mut blob = Vec::with_capacity(SALT_LEN + DERIVED_KEY_LEN);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(key.as_ref());
    BASE64.encode(blob)
}

/// Verify a PIN against a stored credential hash.
///
/// The derived-key comparison is constant-time so timing does not reveal
/// how many leading bytes matched.
pub fn verify_pin(pin: &str, credential_hash: &str) -> bool {
    let blob = match BASE64.decode(credential_hash) {
        Ok(blob) => blob,
        Err(_) => return false,
    };
    if blob.len() != SALT_LEN + DERIVED_KEY_LEN {
        return false;
    }
    let (salt, stored_key) = blob.split_at(SALT_LEN);

    let mut derived = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    pbkdf2_hmac::<Sha256>(pin.as_bytes(), salt, PBKDF2_ITERATIONS, &mut *derived);

    derived.ct_eq(stored_key).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify_succeeds() {
        let credential = hash_pin("13579");
        assert!(verify_pin("13579", &credential));
    }

    #[test]
    fn test_wrong_pin_fails() {
        let credential = hash_pin("13579");
        assert!(!verify_pin("13578", &credential));
        assert!(!verify_pin("97531", &credential));
        assert!(!verify_pin("", &credential));
    }

    #[test]
    fn test_fresh_salt_per_hash() {
        let a = hash_pin("13579");
        let b = hash_pin("13579");
        assert_ne!(a, b);
        assert!(verify_pin("13579", &a));
        assert!(verify_pin("13579", &b));
    }

    #[test]
    fn test_malformed_credential_is_rejected() {
        assert!(!verify_pin("13579", ""));
        assert!(!verify_pin("13579", "not base64 !!!"));
        // Valid base64 but wrong length
        assert!(!verify_pin("13579", &BASE64.encode([0u8; 8])));
        assert!(!verify_pin("13579", &BASE64.encode([0u8; 64])));
    }

    #[test]
    fn test_no_false_accepts_across_random_pins() {
        use rand::Rng;

        let credential = hash_pin("13579");
        let mut rng = rand::thread_rng();
        for _ in 0..1_000 {
            let candidate: String = (0..5).map(|_| rng.gen_range(0..10).to_string()).collect();
            if candidate != "13579" {
                assert!(!verify_pin(&candidate, &credential), "{candidate} accepted");
            }
        }
    }

    #[test]
    fn test_credential_decodes_to_salt_and_key() {
        let blob = BASE64.decode(hash_pin("13579")).unwrap();
        assert_eq!(blob.len(), SALT_LEN + DERIVED_KEY_LEN);
    }
}
