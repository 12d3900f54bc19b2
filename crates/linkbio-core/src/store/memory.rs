// # Memory Stores
//
// In-memory implementations of DocumentStore and LocalStore.
//
// ## Purpose
//
// Simple, fast stores that don't persist across restarts. Useful for
// testing, for embedding, and for previews where no remote is reachable.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - A fresh MemoryLocalStore holds no marker, so the first freshness check
//   after a restart reports `Stale` and the caller prefers remote data

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::config::{DocumentStoreConfig, LocalStoreConfig};
use crate::model::{CollectionPath, Document, DocumentPath, Fields, Filter, WriteMode};
use crate::traits::{DocumentStore, DocumentStoreFactory, LocalStore, LocalStoreFactory};

/// In-memory document store
///
/// Documents are kept in a `BTreeMap` keyed by full document path, so a
/// collection is a contiguous key range.
///
/// # Example
///
/// ```rust,no_run
/// use linkbio_core::model::{CollectionPath, Fields, Filter};
/// use linkbio_core::store::MemoryDocumentStore;
/// use linkbio_core::traits::DocumentStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryDocumentStore::new();
///     let links = CollectionPath::new("teams/abc/links");
///
///     let id = store.create(&links, Fields::new()).await?;
///     let docs = store.query(&links, &Filter::All).await?;
///     assert_eq!(docs[0].id, id);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    documents: Arc<RwLock<BTreeMap<String, Fields>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryDocumentStore {
    /// Create a new empty memory document store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document directly, bypassing the port (fixture setup)
    pub async fn insert(&self, path: &DocumentPath, fields: Fields) {
        self.documents
            .write()
            .await
            .insert(path.as_str().to_string(), fields);
    }

    /// Number of documents in the store
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn generate_id(&self) -> String {
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stamp = chrono::Utc::now().timestamp_millis();
        format!("{:x}{:06x}", stamp, seq)
    }
}

fn is_direct_child(key: &str, prefix: &str) -> bool {
    key.strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, Error> {
        let guard = self.documents.read().await;
        Ok(guard
            .get(path.as_str())
            .map(|fields| Document::new(path.id(), fields.clone())))
    }

    async fn set(&self, path: &DocumentPath, fields: Fields, mode: WriteMode) -> Result<(), Error> {
        let mut guard = self.documents.write().await;
        match mode {
            WriteMode::Replace => {
                guard.insert(path.as_str().to_string(), fields);
            }
            WriteMode::Merge => {
                let existing = guard.entry(path.as_str().to_string()).or_default();
                for (key, value) in fields {
                    existing.insert(key, value);
                }
            }
        }
        Ok(())
    }

    async fn create(&self, collection: &CollectionPath, fields: Fields) -> Result<String, Error> {
        let id = self.generate_id();
        let path = collection.doc(&id);
        self.documents
            .write()
            .await
            .insert(path.as_str().to_string(), fields);
        Ok(id)
    }

    async fn delete(&self, path: &DocumentPath) -> Result<(), Error> {
        self.documents.write().await.remove(path.as_str());
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionPath,
        filter: &Filter,
    ) -> Result<Vec<Document>, Error> {
        let prefix = format!("{}/", collection.as_str());
        let guard = self.documents.read().await;
        Ok(guard
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, fields)| is_direct_child(key, &prefix) && filter.matches(fields))
            .map(|(key, fields)| Document::new(&key[prefix.len()..], fields.clone()))
            .collect())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for MemoryDocumentStore
pub struct MemoryDocumentStoreFactory;

impl DocumentStoreFactory for MemoryDocumentStoreFactory {
    fn create(&self, config: &DocumentStoreConfig) -> Result<Box<dyn DocumentStore>, Error> {
        match config {
            DocumentStoreConfig::Memory => Ok(Box::new(MemoryDocumentStore::new())),
            _ => Err(Error::config("Invalid config for memory document store")),
        }
    }
}

/// In-memory local key-value store
#[derive(Debug, Clone, Default)]
pub struct MemoryLocalStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryLocalStore {
    /// Create a new empty memory local store
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all values from the store
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.inner.write().await.remove(key);
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}

/// Factory for MemoryLocalStore
pub struct MemoryLocalStoreFactory;

#[async_trait]
impl LocalStoreFactory for MemoryLocalStoreFactory {
    async fn create(&self, config: &LocalStoreConfig) -> Result<Box<dyn LocalStore>, Error> {
        match config {
            LocalStoreConfig::Memory => Ok(Box::new(MemoryLocalStore::new())),
            _ => Err(Error::config("Invalid config for memory local store")),
        }
    }
}
