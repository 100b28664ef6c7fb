//! In-memory credential store for tests and embedded use.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CredentialRecord, StoreError, UserStore};

/// Map-backed store. The whole map is guarded by one lock, which trivially
/// serializes writes per identity.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_identity(
        &self,
        identity: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.records.read().await.get(identity).cloned())
    }

    async fn create(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.identity) {
            return Err(StoreError::AlreadyExists);
        }
        records.insert(record.identity.clone(), record.clone());
        Ok(())
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.identity.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(identity: &str) -> CredentialRecord {
        CredentialRecord::new(
            identity.to_string(),
            "hash".to_string(),
            "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ".to_string(),
            None,
        )
    }

    #[tokio::test]
    async fn create_then_find() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.create(&record("alice@example.com")).await?;
        let found = store.find_by_identity("alice@example.com").await?;
        assert_eq!(found.map(|r| r.identity), Some("alice@example.com".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn create_rejects_duplicate_identity() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.create(&record("alice@example.com")).await?;
        let result = store.create(&record("alice@example.com")).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists)));
        Ok(())
    }

    #[tokio::test]
    async fn save_replaces_the_record() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let mut rec = record("alice@example.com");
        store.create(&rec).await?;
        rec.model_blob = json!({"pattern": "abc"});
        store.save(&rec).await?;
        let found = store
            .find_by_identity("alice@example.com")
            .await?
            .expect("record");
        assert_eq!(found.model_blob, json!({"pattern": "abc"}));
        Ok(())
    }

    #[tokio::test]
    async fn find_unknown_identity_is_none() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        assert!(store.find_by_identity("ghost@example.com").await?.is_none());
        Ok(())
    }
}
