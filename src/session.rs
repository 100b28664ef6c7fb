//! Stateless session credentials.
//!
//! A session is an HS256-signed token binding an identity to an expiry.
//! Nothing is persisted server-side and there is no revocation list; a token
//! is valid until it expires. Signing material is injected via
//! [`SessionConfig`], never read from process-wide state.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 60 * 60;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to sign session token")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("invalid session token")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// The authenticated identity.
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token identifier.
    pub jti: String,
}

/// A freshly minted session credential and its advertised lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct SessionConfig {
    signing_secret: SecretString,
    issuer: String,
    ttl_seconds: i64,
}

impl SessionConfig {
    #[must_use]
    pub fn new(signing_secret: SecretString, issuer: String) -> Self {
        Self {
            signing_secret,
            issuer,
            ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }
}

/// Mints and verifies signed session tokens.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl_seconds: i64,
}

impl SessionIssuer {
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        let secret = config.signing_secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            ttl_seconds: config.ttl_seconds,
        }
    }

    /// Mint a session token for a verified identity.
    ///
    /// # Errors
    /// Returns an error when signing fails.
    pub fn issue(&self, identity: &str) -> Result<Session, SessionError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: identity.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + self.ttl_seconds,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(SessionError::Signing)?;

        Ok(Session {
            token,
            expires_in: self.ttl_seconds,
        })
    }

    /// Decode and validate a session token, returning its claims.
    ///
    /// # Errors
    /// Returns an error when the signature, issuer, or expiry is invalid.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(SessionError::Invalid)
    }
}
