//! Key/value persistence for tokens and cached vehicle ids
//!
//! The store is treated as an external, already-consistent service: the
//! orchestration layer only relies on `get`, `put` and `delete`. Two
//! implementations ship with the crate: an in-memory map for request-scoped
//! credentials and tests, and a JSON file for server-held credentials that
//! must survive restarts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{PrecondError, Result};

/// Well-known store keys
pub mod keys {
    /// Cached access token
    pub const ACCESS_TOKEN: &str = "access_token";
    /// Refresh token used to mint new access tokens
    pub const REFRESH_TOKEN: &str = "refresh_token";

    /// Cached internal vehicle id for a VIN
    pub fn vehicle_id(vin: &str) -> String {
        format!("vehicle_id:{}", vin)
    }
}

/// Durable key/value store
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read a value, `None` if the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Write several values together.
    ///
    /// Stores that can persist a batch in one write should override this.
    async fn put_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.put(key, value).await?;
        }
        Ok(())
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local store backed by a `HashMap`.
///
/// A bounded store evicts an arbitrary entry to make room for a new key, so
/// it only suits data that can be fetched again (cached vehicle ids).
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: RwLock<HashMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding at most `capacity` entries
    pub fn bounded(capacity: usize) -> Self {
        Self {
            entries: RwLock::default(),
            capacity: Some(capacity.max(1)),
        }
    }

    /// Create a store pre-populated with entries
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            capacity: None,
        }
    }

    /// Whether a key is currently present
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn insert(&self, map: &mut HashMap<String, String>, key: &str, value: &str) {
        if let Some(capacity) = self.capacity {
            if map.len() >= capacity && !map.contains_key(key) {
                if let Some(victim) = map.keys().next().cloned() {
                    map.remove(&victim);
                }
            }
        }
        map.insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.insert(&mut self.entries.write(), key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn put_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut map = self.entries.write();
        for (key, value) in entries {
            self.insert(&mut map, key, value);
        }
        Ok(())
    }
}

// =============================================================================
// JSON file store
// =============================================================================

/// Store persisted as a flat JSON object on disk.
///
/// The whole map is kept in memory and rewritten on every mutation through a
/// temporary file followed by a rename, so a crash never leaves a half
/// written file behind.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    entries: tokio::sync::Mutex<HashMap<String, String>>,
}

impl FileTokenStore {
    /// Open a store at `path`, loading existing entries if the file exists
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                PrecondError::Store(format!("Failed to parse {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), entries = entries.len(), "Opened token store");

        Ok(Self {
            path,
            entries: tokio::sync::Mutex::new(entries),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.flush(&entries).await?;
        }
        Ok(())
    }

    async fn put_many(&self, batch: &[(&str, &str)]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        for (key, value) in batch {
            entries.insert(key.to_string(), value.to_string());
        }
        self.flush(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get(keys::ACCESS_TOKEN).await.unwrap(), None);

        store.put(keys::ACCESS_TOKEN, "abc").await.unwrap();
        assert_eq!(
            store.get(keys::ACCESS_TOKEN).await.unwrap().as_deref(),
            Some("abc")
        );

        store.delete(keys::ACCESS_TOKEN).await.unwrap();
        assert!(!store.contains(keys::ACCESS_TOKEN));
        // Deleting twice is fine
        store.delete(keys::ACCESS_TOKEN).await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_put_many() {
        let store = MemoryTokenStore::new();
        store
            .put_many(&[(keys::ACCESS_TOKEN, "a"), (keys::REFRESH_TOKEN, "r")])
            .await
            .unwrap();
        assert!(store.contains(keys::ACCESS_TOKEN));
        assert!(store.contains(keys::REFRESH_TOKEN));
    }

    #[tokio::test]
    async fn test_bounded_memory_store_evicts_to_make_room() {
        let store = MemoryTokenStore::bounded(2);
        store.put(&keys::vehicle_id("VIN1"), "V1").await.unwrap();
        store.put(&keys::vehicle_id("VIN2"), "V2").await.unwrap();

        // Overwriting an existing key never evicts
        store.put(&keys::vehicle_id("VIN2"), "V2b").await.unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains(&keys::vehicle_id("VIN1")));

        store.put(&keys::vehicle_id("VIN3"), "V3").await.unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains(&keys::vehicle_id("VIN3")));
    }

    #[test]
    fn test_vehicle_id_key() {
        assert_eq!(keys::vehicle_id("VIN123"), "vehicle_id:VIN123");
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");

        {
            let store = FileTokenStore::open(&path).await.unwrap();
            store
                .put_many(&[(keys::ACCESS_TOKEN, "a1"), (keys::REFRESH_TOKEN, "r1")])
                .await
                .unwrap();
            store.put(&keys::vehicle_id("VIN1"), "V1").await.unwrap();
            store.delete(keys::ACCESS_TOKEN).await.unwrap();
        }

        let reopened = FileTokenStore::open(&path).await.unwrap();
        assert_eq!(reopened.get(keys::ACCESS_TOKEN).await.unwrap(), None);
        assert_eq!(
            reopened.get(keys::REFRESH_TOKEN).await.unwrap().as_deref(),
            Some("r1")
        );
        assert_eq!(
            reopened
                .get(&keys::vehicle_id("VIN1"))
                .await
                .unwrap()
                .as_deref(),
            Some("V1")
        );
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::open(dir.path().join("absent.json"))
            .await
            .unwrap();
        assert_eq!(store.get(keys::REFRESH_TOKEN).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileTokenStore::open(&path).await.unwrap_err();
        assert!(matches!(err, PrecondError::Store(_)));
    }
}
