use super::dispatch::{Attempts, Outcome};
use super::registry::Registry;
use crate::config::{BackendResolver, FallbackConfig};
use crate::{Listing, OpenMode, Operation, Result, Storage, StoredFile};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

/// Presents an ordered list of backends as a single storage.
///
/// Each operation is tried against the backends in registry order, one at a
/// time. See the [module docs](super) for the per-operation policies.
///
/// Data migration is disabled by default. Use
/// [`with_data_migration`](Self::with_data_migration) to copy files read from
/// secondary backends into the primary.
#[derive(Debug, Clone)]
pub struct FallbackStorage {
    registry: Registry,
    data_migration: bool,
}

impl FallbackStorage {
    /// Create fallback storage over `registry`.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            data_migration: false,
        }
    }

    /// Create a builder for adding backends one by one.
    pub fn builder() -> FallbackStorageBuilder {
        FallbackStorageBuilder::new()
    }

    /// Build from configuration, resolving each descriptor with `resolver`.
    pub fn from_config(config: &FallbackConfig, resolver: &BackendResolver) -> Result<Self> {
        let registry = Registry::from_config(config, resolver)?;
        tracing::debug!(
            backends = registry.backend_count(),
            data_migration = config.data_migration,
            "Built fallback storage from config"
        );
        Ok(Self::new(registry).with_data_migration(config.data_migration))
    }

    /// Enable/disable data migration into the primary backend (default: disabled).
    pub fn with_data_migration(mut self, enabled: bool) -> Self {
        self.data_migration = enabled;
        self
    }

    /// Returns true if data migration is enabled.
    pub fn is_data_migration(&self) -> bool {
        self.data_migration
    }

    /// Get the backend registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Get the primary backend.
    pub fn primary(&self) -> &dyn Storage {
        self.registry.primary()
    }

    /// URL from the first backend that holds `name`.
    ///
    /// Holders without url support are passed over. When no backend holds it,
    /// the last backend names the URL.
    async fn url_of_holder(&self, name: &str) -> Result<String> {
        let mut attempts = Attempts::new(Operation::Url);
        let mut held = false;

        for (index, backend) in self.registry.iter() {
            match backend.exists(name).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) if e.is_unsupported() => continue,
                Err(e) => {
                    tracing::warn!(backend = index, name, error = ?e, "Existence check failed, skipping backend for url");
                    continue;
                }
            }

            let outcome = Outcome::classify(backend.url(name).await);
            if matches!(outcome, Outcome::Unsupported) {
                tracing::trace!(backend = index, name, "Holder does not support url, skipping");
                continue;
            }

            held = true;
            if let Some(url) = attempts.record(index, outcome) {
                return Ok(url);
            }
        }

        if held {
            return Err(attempts.into_error());
        }

        tracing::debug!(name, "File not held by any backend, naming url with last backend");
        self.registry.last().url(name).await
    }
}

#[async_trait]
impl Storage for FallbackStorage {
    async fn open(&self, name: &str, mode: OpenMode) -> Result<StoredFile> {
        if self.data_migration {
            return self.open_and_migrate(name, mode).await;
        }

        let hit = self
            .registry
            .first_success(Operation::Open, |b| b.open(name, mode))
            .await?;
        Ok(hit.value)
    }

    async fn save(&self, name: &str, content: Bytes) -> Result<String> {
        let hit = self
            .registry
            .first_success(Operation::Save, move |b| b.save(name, content.clone()))
            .await?;
        Ok(hit.value)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let hit = self
            .registry
            .first_success(Operation::Delete, |b| b.delete(name))
            .await?;
        tracing::debug!(name, backend = hit.index, "Deleted");
        Ok(hit.value)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.registry.any_exists(name).await)
    }

    async fn listdir(&self, path: &str) -> Result<Listing> {
        self.registry.union_listings(path).await
    }

    async fn size(&self, name: &str) -> Result<u64> {
        let hit = self
            .registry
            .first_success(Operation::Size, |b| b.size(name))
            .await?;
        Ok(hit.value)
    }

    async fn url(&self, name: &str) -> Result<String> {
        if !self.data_migration {
            return self.url_of_holder(name).await;
        }

        let hit = self
            .registry
            .first_success(Operation::Url, |b| b.url(name))
            .await?;
        Ok(hit.value)
    }

    async fn accessed_time(&self, name: &str) -> Result<DateTime<Utc>> {
        let hit = self
            .registry
            .first_success(Operation::AccessedTime, |b| b.accessed_time(name))
            .await?;
        Ok(hit.value)
    }

    async fn created_time(&self, name: &str) -> Result<DateTime<Utc>> {
        let hit = self
            .registry
            .first_success(Operation::CreatedTime, |b| b.created_time(name))
            .await?;
        Ok(hit.value)
    }

    async fn modified_time(&self, name: &str) -> Result<DateTime<Utc>> {
        let hit = self
            .registry
            .first_success(Operation::ModifiedTime, |b| b.modified_time(name))
            .await?;
        Ok(hit.value)
    }

    async fn get_valid_name(&self, name: &str) -> Result<String> {
        let hit = self
            .registry
            .first_success(Operation::GetValidName, |b| b.get_valid_name(name))
            .await?;
        Ok(hit.value)
    }

    async fn get_available_name(&self, name: &str) -> Result<String> {
        let hit = self
            .registry
            .first_success(Operation::GetAvailableName, |b| b.get_available_name(name))
            .await?;
        Ok(hit.value)
    }

    async fn path(&self, name: &str) -> Result<PathBuf> {
        let hit = self
            .registry
            .first_success(Operation::Path, |b| b.path(name))
            .await?;
        Ok(hit.value)
    }
}

/// Builder for [`FallbackStorage`].
#[derive(Default)]
pub struct FallbackStorageBuilder {
    backends: Vec<Arc<dyn Storage>>,
    data_migration: bool,
}

impl FallbackStorageBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a backend. Backends added first take priority.
    pub fn add_backend<S: Storage + 'static>(mut self, backend: S) -> Self {
        self.backends.push(Arc::new(backend));
        self
    }

    /// Append a backend that is shared with other owners.
    pub fn add_shared(mut self, backend: Arc<dyn Storage>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Enable/disable data migration (default: disabled).
    pub fn data_migration(mut self, enabled: bool) -> Self {
        self.data_migration = enabled;
        self
    }

    /// Build the storage. Fails if no backend was added.
    pub fn build(self) -> Result<FallbackStorage> {
        let registry = Registry::new(self.backends)?;
        Ok(FallbackStorage::new(registry).with_data_migration(self.data_migration))
    }
}

impl Debug for FallbackStorageBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackStorageBuilder")
            .field("backend_count", &self.backends.len())
            .field("data_migration", &self.data_migration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, StorageExt};

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_fallback_read() {
        use crate::MemoryStorage;

        let primary = MemoryStorage::new();
        let secondary = MemoryStorage::new();
        primary.save_bytes("both", b"primary data").await.unwrap();
        secondary.save_bytes("both", b"secondary data").await.unwrap();
        secondary.save_bytes("second-only", b"secondary data").await.unwrap();

        let storage = FallbackStorage::builder()
            .add_backend(primary)
            .add_backend(secondary)
            .build()
            .unwrap();

        assert_eq!(&storage.read_bytes("both").await.unwrap()[..], b"primary data");
        assert_eq!(
            &storage.read_bytes("second-only").await.unwrap()[..],
            b"secondary data"
        );
        assert!(matches!(
            storage.read_bytes("nowhere").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_save_goes_to_primary() {
        use crate::MemoryStorage;

        let primary = MemoryStorage::new();
        let secondary = MemoryStorage::new();
        let storage = FallbackStorage::builder()
            .add_backend(primary.clone())
            .add_backend(secondary.clone())
            .build()
            .unwrap();

        let stored = storage.save_bytes("test", b"data").await.unwrap();
        assert_eq!(stored, "test");
        assert!(primary.exists("test").await.unwrap());
        assert!(!secondary.exists("test").await.unwrap());
    }

    #[test]
    fn test_builder_without_backends() {
        let result = FallbackStorage::builder().data_migration(true).build();
        assert!(matches!(result.unwrap_err(), Error::Configuration(_)));
    }
}
