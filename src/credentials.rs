//! Credential verification against stored records.

use std::sync::Arc;

use tracing::{debug, error};

use crate::error::AuthError;
use crate::password::SecretHasher;
use crate::store::{CredentialRecord, UserStore};

/// Checks an identity+secret pair. Never inspects TOTP state.
pub struct CredentialVerifier {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn SecretHasher>,
}

impl CredentialVerifier {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, hasher: Arc<dyn SecretHasher>) -> Self {
        Self { store, hasher }
    }

    /// Verify a supplied secret and return the stored record, so each attempt
    /// reads storage exactly once.
    ///
    /// Unknown identities and password mismatches are indistinguishable to the
    /// caller: both are [`AuthError::InvalidCredentials`].
    ///
    /// # Errors
    /// `InvalidCredentials` on any mismatch, `StorageUnavailable` when the
    /// lookup itself fails.
    pub async fn verify(
        &self,
        identity: &str,
        supplied_secret: &str,
    ) -> Result<CredentialRecord, AuthError> {
        let record = match self.store.find_by_identity(identity).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("credential verification for unknown identity");
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => {
                error!("credential lookup failed: {err}");
                return Err(AuthError::StorageUnavailable);
            }
        };

        match self.hasher.verify(supplied_secret, &record.password_hash) {
            Ok(true) => Ok(record),
            Ok(false) => Err(AuthError::InvalidCredentials),
            Err(err) => {
                // An unusable stored hash denies the attempt rather than
                // passing it.
                error!(identity = %record.identity, "stored password hash unusable: {err}");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}
