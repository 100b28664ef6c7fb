//! Rejection taxonomy for authentication attempts.
//!
//! Unknown identities are deliberately not distinguishable from wrong
//! passwords: both surface as [`AuthError::InvalidCredentials`], so the enum
//! cannot be used for account enumeration. Risk-oracle failures never appear
//! here at all — they fold into a step-up demand (fail-closed), and a failed
//! supervised model update is logged and swallowed (the login still succeeds).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("identity must be a valid email address")]
    InvalidIdentity,

    /// Covers an unknown identity, a password mismatch, and (in the direct
    /// flow) a code mismatch after a correct password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Only returned by flows where the code is the sole secret checked
    /// (signup, step-up completion), so it confirms nothing about a password.
    #[error("invalid one-time code")]
    InvalidTotpCode,

    /// The enrollment secret is not valid base32.
    #[error("malformed enrollment secret")]
    InvalidSecretFormat,

    #[error("identity already registered")]
    IdentityExists,

    #[error("password hashing failed")]
    HashingFailed,

    /// Fatal to the attempt; storage is the commit point for all writes.
    #[error("credential store unavailable")]
    StorageUnavailable,

    #[error("session token issuance failed")]
    SessionIssueFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_messages_do_not_leak_identity_state() {
        // The generic rejection reads the same whether the identity exists or not.
        assert_eq!(AuthError::InvalidCredentials.to_string(), "invalid credentials");
    }

    #[test]
    fn totp_rejection_is_distinct_from_credential_rejection() {
        assert_ne!(
            AuthError::InvalidTotpCode.to_string(),
            AuthError::InvalidCredentials.to_string()
        );
    }
}
