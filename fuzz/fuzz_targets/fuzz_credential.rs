#![no_main]

use libfuzzer_sys::fuzz_target;

use hemolock_core::hasher;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes split into a candidate PIN and a credential string:
    // verification must never panic, whatever the credential looks like
    let split = data.len() / 2;
    let (pin_bytes, credential_bytes) = data.split_at(split);

    if let (Ok(pin), Ok(credential)) = (
        std::str::from_utf8(pin_bytes),
        std::str::from_utf8(credential_bytes),
    ) {
        let _ = hasher::verify_pin(pin, credential);
    }
});
