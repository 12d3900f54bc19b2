// # Local Store Trait
//
// Defines the interface for the small amount of client-side state that
// outlives a single call: the cached version marker of each profile.
//
// ## Implementations
//
// - In-memory: `linkbio_core::store::MemoryLocalStore`
// - File-based: `linkbio_core::store::FileLocalStore` (JSON file)

use async_trait::async_trait;

use crate::config::LocalStoreConfig;

/// Trait for persistent string key-value storage
///
/// Used exclusively by the freshness tracker. Values are opaque strings;
/// the tracker stores the decimal encoding of its marker.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Read a value
    ///
    /// # Returns
    ///
    /// - `Ok(Some(String))`: The stored value
    /// - `Ok(None)`: Nothing stored under `key`
    /// - `Err(Error)`: Storage error
    async fn get_string(&self, key: &str) -> Result<Option<String>, crate::Error>;

    /// Store a value, replacing any previous one
    async fn set_string(&self, key: &str, value: &str) -> Result<(), crate::Error>;

    /// Remove a value (succeeds if nothing was stored)
    async fn remove(&self, key: &str) -> Result<(), crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing local stores from configuration
#[async_trait]
pub trait LocalStoreFactory: Send + Sync {
    /// Create a LocalStore instance from configuration
    async fn create(&self, config: &LocalStoreConfig) -> Result<Box<dyn LocalStore>, crate::Error>;
}
