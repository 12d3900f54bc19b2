//! Test doubles and common utilities for contract tests
//!
//! The doubles wrap the in-memory stores, count every call and can be told
//! to fail specific operations.

#![allow(dead_code)]

use linkbio_core::error::{Error, Result};
use linkbio_core::model::{
    Category, CollectionPath, Document, DocumentPath, Fields, Filter, Item, ItemId, WriteMode,
};
use linkbio_core::store::{MemoryDocumentStore, MemoryLocalStore};
use linkbio_core::traits::{DocumentStore, LocalStore};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Document store that records calls and injects failures
#[derive(Clone, Default)]
pub struct RecordingDocumentStore {
    inner: MemoryDocumentStore,
    get_calls: Arc<AtomicUsize>,
    set_calls: Arc<AtomicUsize>,
    create_calls: Arc<AtomicUsize>,
    delete_calls: Arc<AtomicUsize>,
    query_calls: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
    fail_creates: Arc<AtomicBool>,
    fail_sets: Arc<AtomicBool>,
    /// Document ids whose delete fails
    fail_deletes: Arc<Mutex<HashSet<String>>>,
    /// Paths of set calls in call order
    set_log: Arc<Mutex<Vec<(String, WriteMode)>>>,
}

impl RecordingDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryDocumentStore {
        &self.inner
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Total number of mutating calls
    pub fn write_calls(&self) -> usize {
        self.set_calls() + self.create_calls() + self.delete_calls()
    }

    pub fn set_log(&self) -> Vec<(String, WriteMode)> {
        self.set_log.lock().unwrap().clone()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete_of(&self, id: &str) {
        self.fail_deletes.lock().unwrap().insert(id.to_string());
    }

    pub fn reset_counters(&self) {
        for counter in [
            &self.get_calls,
            &self.set_calls,
            &self.create_calls,
            &self.delete_calls,
            &self.query_calls,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for RecordingDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::document_store("injected read failure"));
        }
        self.inner.get(path).await
    }

    async fn set(&self, path: &DocumentPath, fields: Fields, mode: WriteMode) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(Error::document_store("injected write failure"));
        }
        self.set_log
            .lock()
            .unwrap()
            .push((path.as_str().to_string(), mode));
        self.inner.set(path, fields, mode).await
    }

    async fn create(&self, collection: &CollectionPath, fields: Fields) -> Result<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(Error::document_store("injected create failure"));
        }
        self.inner.create(collection, fields).await
    }

    async fn delete(&self, path: &DocumentPath) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.lock().unwrap().contains(path.id()) {
            return Err(Error::document_store("permission denied"));
        }
        self.inner.delete(path).await
    }

    async fn query(&self, collection: &CollectionPath, filter: &Filter) -> Result<Vec<Document>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::document_store("injected read failure"));
        }
        self.inner.query(collection, filter).await
    }

    fn store_name(&self) -> &'static str {
        "recording"
    }
}

/// Local store whose writes can be made to fail
#[derive(Clone, Default)]
pub struct FlakyLocalStore {
    inner: MemoryLocalStore,
    fail_writes: Arc<AtomicBool>,
    set_calls: Arc<AtomicUsize>,
}

impl FlakyLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LocalStore for FlakyLocalStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_string(key).await
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::local_store("injected local write failure"));
        }
        self.inner.set_string(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Build a social link
pub fn link(id: Option<&str>, platform: &str, position: i64) -> Item {
    let item = Item::new(Category::social())
        .with_field("platform", platform)
        .with_field("position", position);
    match id {
        Some(id) => item.with_id(id),
        None => item,
    }
}

/// Convert a JSON object literal into fields
pub fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().expect("object literal")
}

/// Store `items` (which must carry ids) directly in `collection`
pub async fn seed(store: &MemoryDocumentStore, collection: &CollectionPath, items: &[Item]) {
    for item in items {
        let id = item.id.as_ref().expect("seeded items carry ids");
        store
            .insert(&collection.doc(id.as_str()), item.to_document_fields())
            .await;
    }
}

/// Current remote items of `collection`, sorted by id
pub async fn snapshot(store: &dyn DocumentStore, collection: &CollectionPath) -> Vec<Item> {
    let mut items: Vec<Item> = store
        .query(collection, &Filter::All)
        .await
        .unwrap()
        .into_iter()
        .map(Item::from_document)
        .collect();
    items.sort_by(|a, b| a.id.cmp(&b.id));
    items
}

/// Ids of `items`
pub fn ids(items: &[Item]) -> HashSet<ItemId> {
    items.iter().filter_map(|item| item.id.clone()).collect()
}

/// The two-link collection used throughout the scenarios
pub fn scenario_remote() -> Vec<Item> {
    vec![link(Some("a"), "x", 0), link(Some("b"), "y", 1)]
}

pub fn links_collection() -> CollectionPath {
    CollectionPath::new("teams/t1/links")
}
