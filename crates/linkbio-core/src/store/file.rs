// # File Local Store
//
// File-based implementation of LocalStore with crash recovery.
//
// ## Purpose
//
// Keeps version markers across restarts so a client that already holds
// fresh data is not forced to refetch everything after a restart.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Automatic backup: keeps a `.backup` copy of the previous file
// - Recovery: falls back to the backup if the main file fails to parse
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "entries": {
//     "teamVersion": {
//       "value": "2",
//       "updated_at": "2025-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::LocalStoreConfig;
use crate::traits::{LocalStore, LocalStoreFactory};

/// Local store file format version
const LOCAL_FILE_VERSION: &str = "1.0";

/// A stored value with its last write time
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Entry {
    value: String,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl Entry {
    fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            updated_at: chrono::Utc::now(),
        }
    }
}

/// Serializable local store file
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct LocalFileFormat {
    version: String,
    entries: HashMap<String, Entry>,
}

/// File-based local store with crash recovery
///
/// Every write is flushed to disk immediately.
///
/// # Example
///
/// ```rust,no_run
/// use linkbio_core::store::FileLocalStore;
/// use linkbio_core::traits::LocalStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileLocalStore::new("/var/lib/linkbio/local.json").await?;
///
///     store.set_string("teamVersion", "2").await?;
///     assert_eq!(store.get_string("teamVersion").await?, Some("2".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileLocalStore {
    path: PathBuf,
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl FileLocalStore {
    /// Create or load a file local store
    ///
    /// Creates parent directories if needed. A missing file starts empty; a
    /// corrupt file is recovered from its backup, or started empty if the
    /// backup is unusable too.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create local store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let entries = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<HashMap<String, Entry>, Error> {
        let content = match Self::read(path).await? {
            Some(content) => content,
            None => {
                tracing::debug!("Local store file does not exist: {}", path.display());
                return Ok(HashMap::new());
            }
        };

        match serde_json::from_str::<LocalFileFormat>(&content) {
            Ok(file) => {
                if file.version != LOCAL_FILE_VERSION {
                    tracing::warn!(
                        "Local store version mismatch: expected {}, got {}. Loading anyway.",
                        LOCAL_FILE_VERSION,
                        file.version
                    );
                }
                tracing::debug!("Loaded local store: {} entries", file.entries.len());
                Ok(file.entries)
            }
            Err(e) => {
                tracing::warn!(
                    "Local store file {} is corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );
                Self::recover_from_backup(path).await
            }
        }
    }

    async fn recover_from_backup(path: &Path) -> Result<HashMap<String, Entry>, Error> {
        let backup_path = Self::backup_path(path);
        let Some(content) = Self::read(&backup_path).await? else {
            tracing::warn!("No backup file found. Starting with empty local store.");
            return Ok(HashMap::new());
        };

        match serde_json::from_str::<LocalFileFormat>(&content) {
            Ok(file) => {
                tracing::info!("Recovered local store from backup: {} entries", file.entries.len());
                if let Err(e) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore local store from backup: {}", e);
                }
                Ok(file.entries)
            }
            Err(e) => {
                tracing::error!("Backup also corrupted: {}. Starting with empty local store.", e);
                Ok(HashMap::new())
            }
        }
    }

    async fn read(path: &Path) -> Result<Option<String>, Error> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::local_store(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Write the current entries atomically
    async fn write(&self, entries: &HashMap<String, Entry>) -> Result<(), Error> {
        let file = LocalFileFormat {
            version: LOCAL_FILE_VERSION.to_string(),
            entries: entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::local_store(format!("Failed to serialize local store: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::local_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::local_store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.flush().await.map_err(|e| {
                Error::local_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create local store backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::local_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Local store written: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LocalStore for FileLocalStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, Error> {
        let guard = self.entries.read().await;
        Ok(guard.get(key).map(|entry| entry.value.clone()))
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), Error> {
        // Held across the write so concurrent setters persist in order
        let mut guard = self.entries.write().await;
        let mut next = guard.clone();
        next.insert(key.to_string(), Entry::new(value));
        self.write(&next).await?;
        // Only visible once on disk
        *guard = next;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        let mut guard = self.entries.write().await;
        if !guard.contains_key(key) {
            return Ok(());
        }
        let mut next = guard.clone();
        next.remove(key);
        self.write(&next).await?;
        *guard = next;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        let guard = self.entries.read().await;
        self.write(&guard).await
    }
}

/// Factory for FileLocalStore
pub struct FileLocalStoreFactory;

#[async_trait]
impl LocalStoreFactory for FileLocalStoreFactory {
    async fn create(&self, config: &LocalStoreConfig) -> Result<Box<dyn LocalStore>, Error> {
        match config {
            LocalStoreConfig::File { path } => Ok(Box::new(FileLocalStore::new(path).await?)),
            _ => Err(Error::config("Invalid config for file local store")),
        }
    }
}
