//! Client-persistent key/value storage for the session record.
//!
//! A session is four independent entries (see [`keys`]). Stores offer no
//! multi-key transactions, so readers must cope with any subset of the
//! four being present.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use buho_protocol::{Codec, JsonCodec};
use tokio::sync::Mutex;

use crate::StoreError;

/// Names of the persisted session entries.
pub mod keys {
    /// The credential as produced by [`TokenCodec::wrap`](crate::TokenCodec::wrap).
    pub const WRAPPED_CREDENTIAL: &str = "wrappedCredential";
    /// JSON-serialized [`UserProfile`](buho_protocol::UserProfile).
    pub const USER_PROFILE: &str = "userProfile";
    /// Epoch milliseconds of the login.
    pub const LOGIN_TIMESTAMP: &str = "loginTimestamp";
    /// Epoch milliseconds of the last qualifying interaction.
    pub const LAST_ACTIVITY_TIMESTAMP: &str = "lastActivityTimestamp";

    /// Every session key, in the order they are written.
    pub const ALL: [&str; 4] = [
        WRAPPED_CREDENTIAL,
        USER_PROFILE,
        LOGIN_TIMESTAMP,
        LAST_ACTIVITY_TIMESTAMP,
    ];
}

/// Asynchronous string key/value storage.
///
/// Removing a key that isn't there is not an error.
pub trait SessionStore: Send + Sync + 'static {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    fn set(
        &self,
        key: &str,
        value: String,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn remove(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// A store backed by one file holding an encoded key/value map.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash mid-write leaves the previous contents intact.
///
/// A file that no longer decodes makes `get` fail with
/// [`StoreError::Codec`]; the next `set` or `remove` replaces it.
#[derive(Debug)]
pub struct FileStore<C: Codec = JsonCodec> {
    path: PathBuf,
    codec: C,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore<JsonCodec> {
    /// A JSON file store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_codec(path, JsonCodec)
    }
}

impl<C: Codec> FileStore<C> {
    pub fn with_codec(path: impl Into<PathBuf>, codec: C) -> Self {
        Self {
            path: path.into(),
            codec,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(self.codec.decode(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(HashMap::new())
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Loads the map for a read-modify-write. A file that no longer
    /// decodes is replaced: the returned flag says the caller must write
    /// even if nothing changed.
    async fn load_for_write(
        &self,
    ) -> Result<(HashMap<String, String>, bool), StoreError> {
        match self.load().await {
            Ok(entries) => Ok((entries, false)),
            Err(StoreError::Codec(e)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "session file is corrupt, starting over"
                );
                Ok((HashMap::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    async fn save(
        &self,
        entries: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let bytes = self.codec.encode(entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(StoreError::Io)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(StoreError::Io)
    }
}

impl<C: Codec> SessionStore for FileStore<C> {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let (mut entries, _) = self.load_for_write().await?;
        entries.insert(key.to_string(), value);
        self.save(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let (mut entries, recovered) = self.load_for_write().await?;
        if entries.remove(key).is_some() || recovered {
            self.save(&entries).await?;
        }
        Ok(())
    }
}
