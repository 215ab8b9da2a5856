//! Repository persistence collaborator
//!
//! The worker only ever needs three operations on [`RepositoryRecord`]s.
//! Single-document writes are atomic; nothing spans documents.

use super::JsonStore;
use crate::core::{RepoKey, RepositoryRecord, RequesterId};
use crate::strings::path_component;
use crate::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Persistence operations consumed by the worker
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Look up a record
    async fn find(&self, requester_id: &RequesterId, short_name: &str)
        -> Result<Option<RepositoryRecord>>;

    /// Insert or replace a record
    async fn upsert(&self, record: &RepositoryRecord) -> Result<()>;

    /// Delete a record; `Ok(false)` when it did not exist
    async fn delete(&self, requester_id: &RequesterId, short_name: &str) -> Result<bool>;
}

// ============================================================================
// Memory Store
// ============================================================================

/// In-process store, used by tests and embedders
#[derive(Debug, Default)]
pub struct MemoryRepositoryStore {
    records: RwLock<HashMap<RepoKey, RepositoryRecord>>,
}

impl MemoryRepositoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RepositoryStore for MemoryRepositoryStore {
    async fn find(
        &self,
        requester_id: &RequesterId,
        short_name: &str,
    ) -> Result<Option<RepositoryRecord>> {
        let key = RepoKey::new(requester_id.clone(), short_name);
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn upsert(&self, record: &RepositoryRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.key(), record.clone());
        Ok(())
    }

    async fn delete(&self, requester_id: &RequesterId, short_name: &str) -> Result<bool> {
        let key = RepoKey::new(requester_id.clone(), short_name);
        Ok(self.records.write().await.remove(&key).is_some())
    }
}

// ============================================================================
// JSON Store
// ============================================================================

/// One JSON document per requester, keyed by `short_name`
#[derive(Debug)]
pub struct JsonRepositoryStore {
    store: JsonStore,
    /// Serializes read-modify-write of a requester document
    write_lock: Mutex<()>,
}

impl JsonRepositoryStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonStore::new(base_dir),
            write_lock: Mutex::new(()),
        }
    }

    /// `<workspace>/.state/repositories`
    pub fn in_workspace(workspace_dir: impl Into<PathBuf>) -> Self {
        Self::new(workspace_dir.into().join(".state").join("repositories"))
    }

    fn document_name(requester_id: &RequesterId) -> String {
        format!("{}.json", path_component(requester_id.as_str()))
    }

    fn load_document(
        &self,
        requester_id: &RequesterId,
    ) -> Result<BTreeMap<String, RepositoryRecord>> {
        Ok(self
            .store
            .load_optional(&Self::document_name(requester_id))?
            .unwrap_or_default())
    }
}

#[async_trait]
impl RepositoryStore for JsonRepositoryStore {
    async fn find(
        &self,
        requester_id: &RequesterId,
        short_name: &str,
    ) -> Result<Option<RepositoryRecord>> {
        let mut doc = self.load_document(requester_id)?;
        Ok(doc
            .remove(short_name)
            .filter(|record| &record.requester_id == requester_id))
    }

    async fn upsert(&self, record: &RepositoryRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load_document(&record.requester_id)?;
        doc.insert(record.short_name.clone(), record.clone());
        self.store
            .save(&Self::document_name(&record.requester_id), &doc)?;
        debug!(key = %record.key(), "Persisted repository record");
        Ok(())
    }

    async fn delete(&self, requester_id: &RequesterId, short_name: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load_document(requester_id)?;
        match doc.get(short_name) {
            Some(record) if &record.requester_id == requester_id => {}
            _ => return Ok(false),
        }
        doc.remove(short_name);
        self.store.save(&Self::document_name(requester_id), &doc)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(store: &dyn RepositoryStore) {
        let requester = RequesterId::new("42");
        assert!(store.find(&requester, "api").await.unwrap().is_none());

        let record = RepositoryRecord::new(requester.clone(), "api", "acme/api");
        store.upsert(&record).await.unwrap();

        let found = store.find(&requester, "api").await.unwrap().unwrap();
        assert_eq!(found.remote_url, "acme/api");
        assert!(!found.registered);

        // other requesters are isolated
        let other = RequesterId::new("43");
        assert!(store.find(&other, "api").await.unwrap().is_none());

        assert!(store.delete(&requester, "api").await.unwrap());
        assert!(!store.delete(&requester, "api").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(&MemoryRepositoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_json_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRepositoryStore::in_workspace(dir.path());
        exercise(&store).await;
    }

    #[tokio::test]
    async fn test_json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let requester = RequesterId::new("user/with/slashes");
        {
            let store = JsonRepositoryStore::in_workspace(dir.path());
            let mut record = RepositoryRecord::new(requester.clone(), "web", "acme/web");
            record.mark_registered();
            store.upsert(&record).await.unwrap();
        }

        let store = JsonRepositoryStore::in_workspace(dir.path());
        let found = store.find(&requester, "web").await.unwrap().unwrap();
        assert!(found.registered);
    }

    #[tokio::test]
    async fn test_json_store_similar_requesters_stay_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRepositoryStore::in_workspace(dir.path());
        let dotted = RequesterId::new("alice.smith");
        let underscored = RequesterId::new("alice_smith");

        store
            .upsert(&RepositoryRecord::new(dotted.clone(), "api", "acme/private-api"))
            .await
            .unwrap();

        assert!(store.find(&underscored, "api").await.unwrap().is_none());
        assert!(!store.delete(&underscored, "api").await.unwrap());

        store
            .upsert(&RepositoryRecord::new(underscored.clone(), "api", "bob/api"))
            .await
            .unwrap();
        let found = store.find(&dotted, "api").await.unwrap().unwrap();
        assert_eq!(found.requester_id, dotted);
        assert_eq!(found.remote_url, "acme/private-api");
    }
}
