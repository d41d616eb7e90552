#![no_main]

use libfuzzer_sys::fuzz_target;

use hemolock_core::{strength_score, validate, SecurityPolicy};

fuzz_target!(|data: &[u8]| {
    if let Ok(candidate) = std::str::from_utf8(data) {
        let policy = SecurityPolicy::default();

        // Neither surface may panic on arbitrary input
        let report = validate(candidate, &policy);
        let score = strength_score(candidate, &policy);

        assert!(score <= 100);

        // A candidate that validates cleanly is necessarily well-formed,
        // so it always earns at least the base score
        if report.is_valid() {
            assert!(score >= 20);
        }

        // Malformed input scores zero
        if candidate.chars().count() != policy.pin_length
            || !candidate.chars().all(|c| c.is_ascii_digit())
        {
            assert_eq!(score, 0);
        }
    }
});
