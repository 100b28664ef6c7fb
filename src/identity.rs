//! Identity normalization and validation helpers.

use regex::Regex;

/// Normalize an identity for lookup/uniqueness checks.
pub fn normalize(identity: &str) -> String {
    identity.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub fn valid_email(identity_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(identity_normalized))
}
