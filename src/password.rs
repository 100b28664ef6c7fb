//! Password hashing capability.
//!
//! The orchestrator never hashes or compares secrets itself; it goes through
//! [`SecretHasher`]. The bundled implementation is Argon2id producing PHC
//! strings with a fresh salt per hash. Verification is constant-time with
//! respect to the supplied secret.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("failed to hash secret")]
    Hash,
    #[error("stored hash is malformed")]
    MalformedHash,
}

/// Constant-time hashing capability consumed by the credential verifier.
pub trait SecretHasher: Send + Sync {
    /// Hash a plaintext secret for storage.
    ///
    /// # Errors
    /// Returns an error when key derivation fails.
    fn hash(&self, secret: &str) -> Result<String, HashError>;

    /// Check a plaintext secret against a stored hash. A mismatch is
    /// `Ok(false)`; only an unusable stored hash is an error.
    ///
    /// # Errors
    /// Returns an error when the stored hash cannot be parsed.
    fn verify(&self, secret: &str, stored_hash: &str) -> Result<bool, HashError>;
}

/// Argon2id with default parameters and per-hash random salts.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| HashError::Hash)
    }

    fn verify(&self, secret: &str, stored_hash: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(stored_hash).map_err(|_| HashError::MalformedHash)?;
        match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(_) => Err(HashError::MalformedHash),
        }
    }
}
