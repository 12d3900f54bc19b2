//! Plugin-based store registry
//!
//! The registry maps store type names from configuration to factories, so
//! adapters living in other crates can be plugged in without the core
//! knowing about them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use linkbio_core::registry::StoreRegistry;
//! use linkbio_core::config::DocumentStoreConfig;
//!
//! let registry = StoreRegistry::with_builtin();
//! linkbio_store_rest::register(&registry);
//!
//! let config = DocumentStoreConfig::Rest { ... };
//! let store = registry.create_document_store(&config)?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{DocumentStoreConfig, LocalStoreConfig};
use crate::error::{Error, Result};
use crate::store::{FileLocalStoreFactory, MemoryDocumentStoreFactory, MemoryLocalStoreFactory};
use crate::traits::{DocumentStore, DocumentStoreFactory, LocalStore, LocalStoreFactory};

/// Registry of document store and local store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct StoreRegistry {
    /// Registered document store factories
    document_stores: RwLock<HashMap<String, Box<dyn DocumentStoreFactory>>>,

    /// Registered local store factories
    local_stores: RwLock<HashMap<String, Arc<dyn LocalStoreFactory>>>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the stores shipped in this crate
    ///
    /// Registers `memory` document store and `memory` + `file` local stores.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_document_store("memory", Box::new(MemoryDocumentStoreFactory));
        registry.register_local_store("memory", Box::new(MemoryLocalStoreFactory));
        registry.register_local_store("file", Box::new(FileLocalStoreFactory));
        registry
    }

    /// Register a document store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "rest", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_document_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn DocumentStoreFactory>,
    ) {
        let mut stores = self
            .document_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), factory);
    }

    /// Register a local store factory
    pub fn register_local_store(&self, name: impl Into<String>, factory: Box<dyn LocalStoreFactory>) {
        let mut stores = self
            .local_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Create a document store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DocumentStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub fn create_document_store(
        &self,
        config: &DocumentStoreConfig,
    ) -> Result<Box<dyn DocumentStore>> {
        let store_type = config.type_name();
        let stores = self
            .document_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = stores.get(store_type).ok_or_else(|| {
            Error::config(format!("Unknown document store type: {}", store_type))
        })?;

        factory.create(config)
    }

    /// Create a local store from configuration
    pub async fn create_local_store(&self, config: &LocalStoreConfig) -> Result<Box<dyn LocalStore>> {
        let store_type = config.type_name();
        let factory = {
            let stores = self
                .local_stores
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            stores
                .get(store_type)
                .ok_or_else(|| Error::config(format!("Unknown local store type: {}", store_type)))?
                .clone()
        };

        // Lock released before the async create
        factory.create(config).await
    }

    /// List all registered document store types
    pub fn list_document_stores(&self) -> Vec<String> {
        let stores = self
            .document_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// List all registered local store types
    pub fn list_local_stores(&self) -> Vec<String> {
        let stores = self
            .local_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// Check if a document store type is registered
    pub fn has_document_store(&self, name: &str) -> bool {
        let stores = self
            .document_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }

    /// Check if a local store type is registered
    pub fn has_local_store(&self, name: &str) -> bool {
        let stores = self
            .local_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}
