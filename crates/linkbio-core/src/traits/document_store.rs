// # Document Store Trait
//
// Defines the interface to the managed document database that holds
// profile documents and their link collections.
//
// ## Implementations
//
// - In-memory: `linkbio_core::store::MemoryDocumentStore`
// - REST/JSON: `linkbio-store-rest` crate
//
// ## Usage
//
// ```rust,ignore
// use linkbio_core::DocumentStore;
// use linkbio_core::model::{CollectionPath, Filter};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* DocumentStore implementation */;
//
//     let links = CollectionPath::new("teams/abc/links");
//     for doc in store.query(&links, &Filter::All).await? {
//         println!("{}: {:?}", doc.id, doc.fields);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::config::DocumentStoreConfig;
use crate::model::{CollectionPath, Document, DocumentPath, Fields, Filter, WriteMode};

/// Trait for document store implementations
///
/// The core only ever calls these five shapes. "Fetch returns current
/// state, write returns success or failure" is the whole contract.
///
/// # Thread Safety
///
/// Implementations must be thread-safe: the reconciler dispatches writes
/// for different documents concurrently against one shared instance.
///
/// # Responsibilities
///
/// Stores perform single-shot calls. They must not retry, cache reads
/// across calls, or decide whether a write is needed; the reconciler owns
/// those decisions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Document))`: The document's current state
    /// - `Ok(None)`: No document at `path`
    /// - `Err(Error)`: The read failed (network, permission, ...)
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, crate::Error>;

    /// Write fields to a document, creating it if needed
    ///
    /// With [`WriteMode::Replace`] the document ends up holding exactly
    /// `fields`. With [`WriteMode::Merge`] only the given top-level fields
    /// are overwritten.
    async fn set(
        &self,
        path: &DocumentPath,
        fields: Fields,
        mode: WriteMode,
    ) -> Result<(), crate::Error>;

    /// Create a document with a store-generated id
    ///
    /// # Returns
    ///
    /// The generated document id (last path segment)
    async fn create(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<String, crate::Error>;

    /// Delete a document
    ///
    /// Deleting a document that does not exist succeeds.
    async fn delete(&self, path: &DocumentPath) -> Result<(), crate::Error>;

    /// List the documents of a collection matching `filter`
    ///
    /// Only direct children of `collection` are returned.
    async fn query(
        &self,
        collection: &CollectionPath,
        filter: &Filter,
    ) -> Result<Vec<Document>, crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing document stores from configuration
pub trait DocumentStoreFactory: Send + Sync {
    /// Create a DocumentStore instance from configuration
    fn create(
        &self,
        config: &DocumentStoreConfig,
    ) -> Result<Box<dyn DocumentStore>, crate::Error>;
}
