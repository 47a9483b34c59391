use crate::{Error, Listing, OpenMode, Operation, Result, Storage, StoredFile, names};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct Entry {
    data: Bytes,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    accessed: DateTime<Utc>,
}

impl Entry {
    fn new(data: Bytes) -> Self {
        let now = Utc::now();
        Self {
            data,
            created: now,
            modified: now,
            accessed: now,
        }
    }
}

/// A simple in-memory `Storage` adapter.
///
/// - Names are `/`-separated; directories exist implicitly.
/// - Clones share the same underlying map.
/// - `url` is only supported when a base URL is configured; `path` is never supported.
///
/// Intended for tests, local development, and ephemeral usage.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
    base_url: Option<String>,
}

impl MemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new in-memory storage from an existing map.
    pub fn from_map(map: HashMap<String, Vec<u8>>) -> Self {
        let entries = map
            .into_iter()
            .map(|(name, data)| (name, Entry::new(Bytes::from(data))))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(entries)),
            base_url: None,
        }
    }

    /// Serve URLs as `base_url` followed by the file name.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// The configured base URL, if any.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Returns the number of stored files.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if there are no stored files.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all files.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Get a copy of the bytes for `name` (useful for tests).
    pub fn contents(&self, name: &str) -> Result<Bytes> {
        self.read()
            .get(name)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.inner.read().expect("poisoned lock")
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.inner.write().expect("poisoned lock")
    }

    fn entry(&self, name: &str) -> Result<Entry> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Avoid dumping potentially large in-memory contents.
        f.debug_struct("MemoryStorage")
            .field("len", &self.len())
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn open(&self, name: &str, _mode: OpenMode) -> Result<StoredFile> {
        let data = {
            let mut map = self.write();
            let entry = map
                .get_mut(name)
                .ok_or_else(|| Error::NotFound(name.to_string()))?;
            entry.accessed = Utc::now();
            entry.data.clone()
        };
        Ok(StoredFile::from_bytes(name, data))
    }

    async fn save(&self, name: &str, content: Bytes) -> Result<String> {
        let mut map = self.write();
        match map.get_mut(name) {
            Some(entry) => {
                let now = Utc::now();
                entry.data = content;
                entry.modified = now;
                entry.accessed = now;
            }
            None => {
                map.insert(name.to_string(), Entry::new(content));
            }
        }
        Ok(name.to_string())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.write().remove(name);
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.read().contains_key(name))
    }

    async fn listdir(&self, path: &str) -> Result<Listing> {
        let dir = path.trim_matches('/');
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        let map = self.read();
        let mut directories = BTreeSet::new();
        let mut files = BTreeSet::new();
        for name in map.keys() {
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((child, _)) => {
                    directories.insert(child.to_string());
                }
                None => {
                    files.insert(rest.to_string());
                }
            }
        }

        if !dir.is_empty() && directories.is_empty() && files.is_empty() {
            return Err(Error::NotFound(path.to_string()));
        }

        Ok(Listing::new(
            directories.into_iter().collect(),
            files.into_iter().collect(),
        ))
    }

    async fn size(&self, name: &str) -> Result<u64> {
        Ok(self.entry(name)?.data.len() as u64)
    }

    async fn url(&self, name: &str) -> Result<String> {
        let base = self
            .base_url
            .as_deref()
            .ok_or(Error::Unsupported(Operation::Url))?;
        Ok(format!("{}/{}", base.trim_end_matches('/'), name))
    }

    async fn accessed_time(&self, name: &str) -> Result<DateTime<Utc>> {
        Ok(self.entry(name)?.accessed)
    }

    async fn created_time(&self, name: &str) -> Result<DateTime<Utc>> {
        Ok(self.entry(name)?.created)
    }

    async fn modified_time(&self, name: &str) -> Result<DateTime<Utc>> {
        Ok(self.entry(name)?.modified)
    }

    async fn get_valid_name(&self, name: &str) -> Result<String> {
        names::valid_name(name)
    }

    async fn get_available_name(&self, name: &str) -> Result<String> {
        names::available_name(name, |candidate| {
            let taken = self.read().contains_key(&candidate);
            async move { Ok(taken) }
        })
        .await
    }
}
