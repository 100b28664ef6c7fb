//! TOTP engine: enrollment-secret generation and one-time-code validation.
//!
//! Codes are the standard HMAC-SHA1 construction over a 30-second time step,
//! 6 digits, zero-padded. Validation is strict single-window: there is no
//! ±1-step grace, so a code issued just before a step boundary is rejected a
//! moment later. That is expected behavior, not a bug, and is pinned by a
//! test below.

use thiserror::Error;
use totp_rs::{Algorithm, Secret, TOTP};

const DIGITS: usize = 6;
const PERIOD: u64 = 30;
// No tolerance window; only the current step is accepted.
const SKEW: u8 = 0;

#[derive(Debug, Error)]
pub enum TotpError {
    /// The secret is not valid base32 (or is otherwise unusable as a key).
    #[error("malformed enrollment secret: {0}")]
    InvalidSecret(String),
}

/// Stateless code generator/validator bound to an issuer name.
#[derive(Debug, Clone)]
pub struct TotpEngine {
    issuer: String,
}

impl TotpEngine {
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    /// Generate a fresh enrollment secret: 20 bytes of CSPRNG output,
    /// base32-encoded without padding.
    ///
    /// # Errors
    /// Returns an error if the generated key material cannot be encoded.
    pub fn generate_secret(&self) -> Result<String, TotpError> {
        let secret = Secret::generate_secret();
        let bytes = secret
            .to_bytes()
            .map_err(|e| TotpError::InvalidSecret(e.to_string()))?;
        Ok(self.build(bytes)?.get_secret_base32())
    }

    /// Compute the code for `secret` at unix time `now`. Pure function of
    /// `(secret, now / 30)`.
    ///
    /// # Errors
    /// Returns [`TotpError::InvalidSecret`] when `secret` is not valid base32.
    pub fn current_code(&self, secret: &str, now: u64) -> Result<String, TotpError> {
        Ok(self.build(decode_secret(secret)?)?.generate(now))
    }

    /// Check `code` against `secret` for the time step containing `now`.
    /// A mismatch is `Ok(false)`, distinct from a malformed secret.
    ///
    /// # Errors
    /// Returns [`TotpError::InvalidSecret`] when `secret` is not valid base32.
    pub fn validate(&self, secret: &str, code: &str, now: u64) -> Result<bool, TotpError> {
        Ok(self.build(decode_secret(secret)?)?.check(code, now))
    }

    fn build(&self, secret_bytes: Vec<u8>) -> Result<TOTP, TotpError> {
        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            PERIOD,
            secret_bytes,
            Some(self.issuer.clone()),
            "user".to_string(), // label doesn't matter for code computation
        )
        .map_err(|e| TotpError::InvalidSecret(e.to_string()))
    }
}

fn decode_secret(secret: &str) -> Result<Vec<u8>, TotpError> {
    Secret::Encoded(secret.trim().to_string())
        .to_bytes()
        .map_err(|e| TotpError::InvalidSecret(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6238's SHA-1 test key ("12345678901234567890" in base32).
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn engine() -> TotpEngine {
        TotpEngine::new("gardisto")
    }

    #[test]
    fn golden_vector_rfc6238_t59() -> Result<(), TotpError> {
        // RFC 6238 Appendix B: T=59 yields 94287082; the 6-digit code is the
        // low-order truncation.
        let code = engine().current_code(RFC_SECRET, 59)?;
        assert_eq!(code, "287082");
        Ok(())
    }

    #[test]
    fn codes_are_six_zero_padded_digits() -> Result<(), TotpError> {
        let engine = engine();
        for now in (0..3000).step_by(137) {
            let code = engine.current_code(RFC_SECRET, now)?;
            assert_eq!(code.len(), 6, "code {code} at {now}");
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
        Ok(())
    }

    #[test]
    fn validate_accepts_current_code_at_same_instant() -> Result<(), TotpError> {
        let engine = engine();
        let secret = engine.generate_secret()?;
        let now = 1_700_000_000;
        let code = engine.current_code(&secret, now)?;
        assert!(engine.validate(&secret, &code, now)?);
        Ok(())
    }

    #[test]
    fn validate_is_stable_within_one_step() -> Result<(), TotpError> {
        let engine = engine();
        let step_start = 1_700_000_010 - (1_700_000_010 % 30);
        let code = engine.current_code(RFC_SECRET, step_start)?;
        assert!(engine.validate(RFC_SECRET, &code, step_start + 29)?);
        Ok(())
    }

    #[test]
    fn validate_rejects_code_from_previous_step() -> Result<(), TotpError> {
        // Strict single-window behavior: crossing the 30-second boundary
        // invalidates the code immediately.
        let engine = engine();
        let step_start = 1_700_000_010 - (1_700_000_010 % 30);
        let code = engine.current_code(RFC_SECRET, step_start)?;
        assert!(!engine.validate(RFC_SECRET, &code, step_start + 30)?);
        Ok(())
    }

    #[test]
    fn validate_rejects_wrong_code() -> Result<(), TotpError> {
        let engine = engine();
        let now = 1_700_000_000;
        let code = engine.current_code(RFC_SECRET, now)?;
        let wrong = if code == "000000" { "000001" } else { "000000" };
        assert!(!engine.validate(RFC_SECRET, wrong, now)?);
        Ok(())
    }

    #[test]
    fn malformed_secret_is_a_distinct_error() {
        let engine = engine();
        let result = engine.validate("not base32!!", "123456", 0);
        assert!(matches!(result, Err(TotpError::InvalidSecret(_))));
    }

    #[test]
    fn generated_secrets_decode_to_twenty_bytes() -> Result<(), TotpError> {
        let engine = engine();
        let secret = engine.generate_secret()?;
        let bytes = decode_secret(&secret)?;
        assert_eq!(bytes.len(), 20);
        // 20 bytes encode to 32 base32 characters without padding.
        assert_eq!(secret.len(), 32);
        Ok(())
    }

    #[test]
    fn generated_secrets_are_unique() -> Result<(), TotpError> {
        let engine = engine();
        assert_ne!(engine.generate_secret()?, engine.generate_secret()?);
        Ok(())
    }
}
