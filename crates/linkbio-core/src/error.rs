//! Error types for profile sync
//!
//! This module defines all error types used throughout the crate.

use std::fmt;

use thiserror::Error;

use crate::model::ItemId;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for profile sync
#[derive(Error, Debug)]
pub enum Error {
    /// Reading a remote snapshot or parent document failed
    ///
    /// Nothing was written when this is returned.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// One or more writes of a reconcile pass failed
    ///
    /// Writes that succeeded are not rolled back. Re-running the
    /// reconcile converges the remainder.
    #[error("{} of {attempted} write(s) failed: {}", .failures.len(), WriteFailures(.failures))]
    Write {
        /// Number of operations dispatched in the pass
        attempted: usize,
        /// The operations that failed
        failures: Vec<WriteFailure>,
    },

    /// Document store port errors
    #[error("Document store error: {0}")]
    DocumentStore(String),

    /// Local key-value store errors
    #[error("Local store error: {0}")]
    LocalStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Document not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP client errors (from remote store APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Store-specific error
    #[error("Store error ({store}): {message}")]
    Store {
        /// Store name
        store: String,
        /// Error message
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a document store error
    pub fn document_store(msg: impl Into<String>) -> Self {
        Self::DocumentStore(msg.into())
    }

    /// Create a local store error
    pub fn local_store(msg: impl Into<String>) -> Self {
        Self::LocalStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a store-specific error
    pub fn store(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from reading remote state
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }

    /// The failed writes, if this is an aggregate write failure
    pub fn write_failures(&self) -> &[WriteFailure] {
        match self {
            Self::Write { failures, .. } => failures.as_slice(),
            _ => &[],
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Kind of a reconcile operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// What a failed operation was aimed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    /// An item that already exists remotely
    Existing(ItemId),
    /// A new item, identified by its index in the desired list
    New { index: usize },
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteTarget::Existing(id) => write!(f, "{}", id),
            WriteTarget::New { index } => write!(f, "new item #{}", index),
        }
    }
}

/// A single failed write from a reconcile pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub kind: OperationKind,
    pub target: WriteTarget,
    pub message: String,
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.target, self.message)
    }
}

struct WriteFailures<'a>(&'a [WriteFailure]);

impl fmt::Display for WriteFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}
