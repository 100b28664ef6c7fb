//! Credential storage capability.
//!
//! Storage owns the [`CredentialRecord`]; the orchestrator reads and writes it
//! only through [`UserStore`] and never caches a record beyond one request.
//! `create` backs signup (no partial writes: a conflicting identity fails the
//! whole operation), `save` backs behavioral-model persistence.

mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Per-identity credential state. The TOTP secret is set once at enrollment
/// and is the single source of truth for all code validation afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub identity: String,
    pub password_hash: String,
    pub totp_secret: String,
    pub display_name: Option<String>,
    pub model_blob: Value,
    pub created_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// A fresh record with an empty behavioral model.
    #[must_use]
    pub fn new(
        identity: String,
        password_hash: String,
        totp_secret: String,
        display_name: Option<String>,
    ) -> Self {
        Self {
            identity,
            password_hash,
            totp_secret,
            display_name,
            model_blob: json!({}),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("identity already registered")]
    AlreadyExists,

    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

/// Opaque key-value lookup of credential records by identity.
///
/// Writes are atomic per record. Concurrent attempts for the same identity are
/// last-write-wins on the model blob; there is no optimistic locking, so a
/// lost update between two in-flight attempts is an accepted race.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_identity(
        &self,
        identity: &str,
    ) -> Result<Option<CredentialRecord>, StoreError>;

    /// Insert a new record, failing with [`StoreError::AlreadyExists`] when
    /// the identity is taken. Nothing is written on failure.
    async fn create(&self, record: &CredentialRecord) -> Result<(), StoreError>;

    /// Replace the stored record for `record.identity` in one atomic write.
    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_with_empty_model() {
        let record = CredentialRecord::new(
            "alice@example.com".to_string(),
            "$argon2id$stub".to_string(),
            "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ".to_string(),
            Some("Alice".to_string()),
        );
        assert_eq!(record.model_blob, json!({}));
        assert_eq!(record.identity, "alice@example.com");
    }

    #[test]
    fn record_round_trips_through_json() -> anyhow::Result<()> {
        let record = CredentialRecord::new(
            "bob@example.com".to_string(),
            "hash".to_string(),
            "secret".to_string(),
            None,
        );
        let decoded: CredentialRecord = serde_json::from_value(serde_json::to_value(&record)?)?;
        assert_eq!(decoded.identity, record.identity);
        assert_eq!(decoded.model_blob, record.model_blob);
        Ok(())
    }
}
