//! Core traits for profile sync
//!
//! This module defines the ports the core talks to. Nothing in the core
//! depends on a store's transport, auth or subscription mechanism.
//!
//! - [`DocumentStore`]: Remote document database (profiles, link collections)
//! - [`LocalStore`]: Small persistent key-value storage on the client

pub mod document_store;
pub mod local_store;

pub use document_store::{DocumentStore, DocumentStoreFactory};
pub use local_store::{LocalStore, LocalStoreFactory};
