//! Durable key-value storage for collections.
//!
//! The event store and friend directory persist whole collections as opaque
//! JSON blobs under fixed keys. [`Store`] is the seam; [`MemoryStore`] backs
//! tests and the in-process demo, [`FileStore`] keeps one file per key in a
//! data directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error for key {key}: {source}")]
    Io {
        /// The key being read or written.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A stored blob could not be decoded.
    #[error("corrupt data under key {key}: {source}")]
    Corrupt {
        /// The key that was read.
        key: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A collection could not be encoded.
    #[error("failed to encode {key}: {source}")]
    Encode {
        /// The key being written.
        key: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Load and save opaque blobs by key.
#[async_trait]
pub trait Store: Send + Sync {
    /// Load the blob stored under `key`, or `None` if nothing was saved yet.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the blob stored under `key`.
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Load a JSON collection; a missing key is an empty collection.
pub(crate) async fn load_json<T>(store: &dyn Store, key: &str) -> Result<Vec<T>, StoreError>
where
    T: serde::de::DeserializeOwned,
{
    match store.load(key).await? {
        Some(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        }),
        None => Ok(Vec::new()),
    }
}

/// Save a JSON collection.
pub(crate) async fn save_json<T>(store: &dyn Store, key: &str, items: &[T]) -> Result<(), StoreError>
where
    T: serde::Serialize,
{
    let bytes = serde_json::to_vec(items).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.save(key, &bytes).await
}

/// In-memory store. Clones share the same contents.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently holding data.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.blobs
            .write()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// A [`MemoryStore`] whose saves fail while `full` is set.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: MemoryStore,
    pub(crate) full: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
#[async_trait]
impl Store for FlakyStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if self.full.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Io {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.save(key, bytes).await
    }
}

/// One `<key>.json` file per key inside a directory.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash mid-write never leaves a truncated collection. On Unix the files
/// are owner read/write only.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Use `dir` for storage, creating it if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io {
                key: dir.display().to_string(),
                source,
            })?;
        Ok(Self { dir })
    }

    /// The storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl Store for FileStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        set_file_permissions_0600(&tmp).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(())
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
async fn set_file_permissions_0600(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
