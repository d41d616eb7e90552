//! Canonical PIN validation and strength scoring
//!
//! This is the single home for every PIN quality check. Both `validate` and
//! `strength_score` are built on the same private predicates so the two
//! surfaces cannot drift apart (the UI's live-feedback path scores through
//! here as well).

use std::fmt;

use crate::policy::SecurityPolicy;

/// Hard validation errors; any of these makes the PIN unusable
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty or missing input
    Empty,
    /// Wrong number of characters
    WrongLength {
        /// Required length from the policy
        expected: usize,
    },
    /// Contains characters other than ASCII digits
    NonDigit,
    /// Digits form a monotonic ascending or descending run
    Sequential,
    /// All digits are identical
    Repeated,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "PIN must not be empty"),
            Self::WrongLength { expected } => write!(f, "PIN must be exactly {expected} digits"),
            Self::NonDigit => write!(f, "PIN must contain only digits"),
            Self::Sequential => write!(f, "PIN must not be a sequential run"),
            Self::Repeated => write!(f, "PIN must not repeat a single digit"),
        }
    }
}

/// Soft warnings; never affect validity, shown as UX guidance
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationWarning {
    /// Matches the fixed deny-list of well-known weak PINs
    CommonPin,
    /// Low-entropy alternating pattern such as 41414
    AlternatingPattern,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommonPin => write!(f, "this PIN is commonly guessed"),
            Self::AlternatingPattern => write!(f, "alternating digits are easy to guess"),
        }
    }
}

/// Outcome of a validation pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Hard errors, in the order detected
    pub errors: Vec<ValidationError>,
    /// Soft warnings, in the order detected
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    /// True iff no hard errors were recorded; warnings never invalidate
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "valid");
        }
        let joined = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{joined}")
    }
}

/// Shape-only check: empty, wrong length, or non-digit input.
///
/// This is the check the login path uses. A malformed candidate can never
/// match a stored credential, so it is rejected without consuming an
/// attempt; sequential/repeated are rules about *choosing* a PIN and apply
/// only at setup and change time.
pub fn validate_shape(candidate: &str, policy: &SecurityPolicy) -> ValidationReport {
    let mut report = ValidationReport::default();

    if candidate.is_empty() {
        report.errors.push(ValidationError::Empty);
    } else if candidate.chars().count() != policy.pin_length {
        report.errors.push(ValidationError::WrongLength {
            expected: policy.pin_length,
        });
    } else if digit_values(candidate).is_none() {
        report.errors.push(ValidationError::NonDigit);
    }

    report
}

/// Check a candidate PIN against the full policy, for setup and change.
///
/// Shape problems (empty, wrong length, non-digit) short-circuit; policy
/// problems (sequential, repeated) and warnings accumulate.
pub fn validate(candidate: &str, policy: &SecurityPolicy) -> ValidationReport {
    let mut report = validate_shape(candidate, policy);
    if !report.is_valid() {
        return report;
    }
    let Some(digits) = digit_values(candidate) else {
        return report;
    };

    if !policy.allow_sequential && is_sequential(&digits) {
        report.errors.push(ValidationError::Sequential);
    }
    if !policy.allow_repeated && is_all_repeated(&digits) {
        report.errors.push(ValidationError::Repeated);
    }
    if is_well_known_weak(&digits) {
        report.warnings.push(ValidationWarning::CommonPin);
    }
    if is_alternating(&digits) {
        report.warnings.push(ValidationWarning::AlternatingPattern);
    }

    report
}

/// Strength score for UX feedback, 0-100.
///
/// 20 for any well-formed digit PIN, +20 each for clearing the sequential,
/// repeated, and deny-list checks, +5 per distinct digit, clamped to 100.
/// Uses the same predicates as `validate`.
pub fn strength_score(candidate: &str, policy: &SecurityPolicy) -> u8 {
    let digits = match digit_values(candidate) {
        Some(d) if d.len() == policy.pin_length => d,
        _ => return 0,
    };

    let mut score: u32 = 20;
    if !is_sequential(&digits) {
        score += 20;
    }
    if !is_all_repeated(&digits) {
        score += 20;
    }
    if !is_well_known_weak(&digits) {
        score += 20;
    }
    score += 5 * distinct_digits(&digits);

    score.min(100) as u8
}

fn digit_values(candidate: &str) -> Option<Vec<u8>> {
    candidate
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8))
        .collect()
}

/// Monotonic run with step 1, evaluated modulo 10 so decade-wrap forms
/// (90123, 21098) count alongside 01234 and 98765.
fn is_sequential(digits: &[u8]) -> bool {
    if digits.len() < 2 {
        return false;
    }
    let ascending = digits.windows(2).all(|w| (w[1] + 10 - w[0]) % 10 == 1);
    let descending = digits.windows(2).all(|w| (w[0] + 10 - w[1]) % 10 == 1);
    ascending || descending
}

fn is_all_repeated(digits: &[u8]) -> bool {
    digits.len() > 1 && digits.iter().all(|&d| d == digits[0])
}

/// The fixed deny-list: canonical ascending/descending runs and
/// all-same-digit forms.
fn is_well_known_weak(digits: &[u8]) -> bool {
    is_sequential(digits) || is_all_repeated(digits)
}

/// Exactly two distinct digits in strict alternation (41414, 90909)
fn is_alternating(digits: &[u8]) -> bool {
    if digits.len() < 4 || distinct_digits(digits) != 2 {
        return false;
    }
    digits.windows(2).all(|w| w[0] != w[1])
        && digits.iter().step_by(2).all(|&d| d == digits[0])
        && digits.iter().skip(1).step_by(2).all(|&d| d == digits[1])
}

fn distinct_digits(digits: &[u8]) -> u32 {
    let mut seen = [false; 10];
    for &d in digits {
        seen[d as usize] = true;
    }
    seen.iter().filter(|&&s| s).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SecurityPolicy {
        SecurityPolicy::default()
    }

    #[test]
    fn test_empty_short_circuits() {
        let report = validate("", &policy());
        assert_eq!(report.errors, vec![ValidationError::Empty]);
        assert!(report.warnings.is_empty());
        assert!(!report.is_valid());
    }

    #[test]
    fn test_wrong_length_short_circuits() {
        let report = validate("1234", &policy());
        assert_eq!(
            report.errors,
            vec![ValidationError::WrongLength { expected: 5 }]
        );
        // No further checks ran, even though 1234 is sequential
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_non_digit_short_circuits() {
        let report = validate("12a45", &policy());
        assert_eq!(report.errors, vec![ValidationError::NonDigit]);
    }

    #[test]
    fn test_sequential_rejected() {
        for pin in ["12345", "54321", "01234", "98765", "90123"] {
            let report = validate(pin, &policy());
            assert!(
                report.errors.contains(&ValidationError::Sequential),
                "{pin} should be sequential"
            );
            assert!(report.warnings.contains(&ValidationWarning::CommonPin));
            assert!(!report.is_valid());
        }
    }

    #[test]
    fn test_repeated_rejected() {
        let report = validate("77777", &policy());
        assert_eq!(report.errors, vec![ValidationError::Repeated]);
        assert!(report.warnings.contains(&ValidationWarning::CommonPin));
    }

    #[test]
    fn test_alternating_warns_only() {
        let report = validate("41414", &policy());
        assert!(report.is_valid());
        assert_eq!(report.warnings, vec![ValidationWarning::AlternatingPattern]);
    }

    #[test]
    fn test_clean_pins_valid() {
        for pin in ["13579", "20481", "86420", "59173"] {
            let report = validate(pin, &policy());
            assert!(report.is_valid(), "{pin} should be valid: {report}");
            assert!(report.warnings.is_empty(), "{pin} should have no warnings");
        }
    }

    #[test]
    fn test_policy_can_allow_weak_shapes() {
        let lenient = SecurityPolicy::lenient();
        let report = validate("12345", &lenient);
        assert!(report.is_valid());
        // Deny-list warning still fires
        assert!(report.warnings.contains(&ValidationWarning::CommonPin));
    }

    #[test]
    fn test_shape_check_ignores_policy_rules() {
        // Sequential and repeated pass the shape check; they are wrong
        // guesses at login time, not malformed input
        for pin in ["12345", "77777", "13579"] {
            assert!(validate_shape(pin, &policy()).is_valid(), "{pin}");
        }

        assert_eq!(
            validate_shape("", &policy()).errors,
            vec![ValidationError::Empty]
        );
        assert_eq!(
            validate_shape("1234", &policy()).errors,
            vec![ValidationError::WrongLength { expected: 5 }]
        );
        assert_eq!(
            validate_shape("12a45", &policy()).errors,
            vec![ValidationError::NonDigit]
        );
    }

    #[test]
    fn test_score_malformed_is_zero() {
        assert_eq!(strength_score("", &policy()), 0);
        assert_eq!(strength_score("12a45", &policy()), 0);
        assert_eq!(strength_score("1234", &policy()), 0);
    }

    #[test]
    fn test_score_weakest_forms() {
        // Repeated: 20 base + 20 not-sequential + 5 * 1 distinct
        assert_eq!(strength_score("77777", &policy()), 45);
        // Sequential: 20 base + 20 not-repeated + 5 * 5 distinct
        assert_eq!(strength_score("12345", &policy()), 65);
    }

    #[test]
    fn test_score_clamps_at_100() {
        // 20 + 20 + 20 + 20 + 25 = 105 -> 100
        assert_eq!(strength_score("13579", &policy()), 100);
    }

    #[test]
    fn test_score_agrees_with_validation_predicates() {
        // Any PIN validate() accepts with no warnings scores at least 80
        for pin in ["13579", "20481", "86420"] {
            assert!(validate(pin, &policy()).is_valid());
            assert!(strength_score(pin, &policy()) >= 80);
        }
    }
}
