// # Store Implementations
//
// This module provides implementations of the DocumentStore and LocalStore
// traits that ship with the core.

pub mod file;
pub mod memory;

pub use file::{FileLocalStore, FileLocalStoreFactory};
pub use memory::{
    MemoryDocumentStore, MemoryDocumentStoreFactory, MemoryLocalStore, MemoryLocalStoreFactory,
};
