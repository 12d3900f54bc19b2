// # linkbio-core
//
// Core library for syncing link-in-bio profiles with a hosted document
// database.
//
// ## Architecture Overview
//
// - **DocumentStore**: Trait for the remote document database (get/set/create/delete/query)
// - **LocalStore**: Trait for the small client-side key-value state
// - **Reconciler**: Converges a remote collection to a desired list of items
// - **FreshnessTracker**: Local/remote version marker comparison and bookkeeping
// - **ProfileService**: Profile read/write operations built on the two above
// - **StoreRegistry**: Plugin-based registry for store implementations
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Sync logic is separate from store implementations
// 2. **Plugin-Based**: Stores are registered dynamically, no hard-coded if-else
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: Re-running a reconcile after a partial failure converges the remainder

pub mod config;
pub mod error;
pub mod event;
pub mod freshness;
pub mod model;
pub mod profile;
pub mod reconcile;
pub mod registry;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{DocumentStoreConfig, LocalStoreConfig, SyncConfig};
pub use error::{Error, Result};
pub use event::SyncEvent;
pub use freshness::{Freshness, FreshnessTracker, MarkerStrategy, VersionMarker};
pub use model::{Category, Item, ItemId};
pub use profile::{
    LinkGroups, Member, Profile, ProfileSection, ProfileService, ProfileSummary, WriteOutcome,
};
pub use reconcile::{Plan, ReconcileReport, Reconciler};
pub use registry::StoreRegistry;
pub use store::{FileLocalStore, MemoryDocumentStore, MemoryLocalStore};
pub use traits::{DocumentStore, LocalStore};
