//! Configuration for building a [`FallbackStorage`](crate::FallbackStorage).
//!
//! A [`FallbackConfig`] lists backend descriptors in priority order plus the
//! data-migration flag. A [`BackendResolver`] turns each descriptor into a live
//! backend: the bundled adapters are built directly, anything else is looked
//! up by name among backends registered ahead of time.
//!
//! With the `config` feature the types deserialize with serde:
//!
//! ```
//! # #[cfg(all(feature = "config", feature = "memory"))]
//! # fn example() -> fallback_storage::Result<()> {
//! use fallback_storage::{BackendResolver, FallbackConfig, FallbackStorage};
//!
//! let config = FallbackConfig::from_json(r#"{
//!     "backends": [
//!         { "type": "memory", "base_url": "http://www.example.com/media/" },
//!         { "type": "memory" }
//!     ],
//!     "data_migration": true
//! }"#)?;
//!
//! let storage = FallbackStorage::from_config(&config, &BackendResolver::new())?;
//! assert!(storage.is_data_migration());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::{Error, Result, Storage};

/// Ordered backend descriptors and the data-migration flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct FallbackConfig {
    /// Backends in priority order; the first one is the primary.
    pub backends: Vec<BackendDescriptor>,

    /// Copy files read from secondary backends into the primary.
    #[cfg_attr(feature = "config", serde(default))]
    pub data_migration: bool,
}

impl FallbackConfig {
    pub fn new(backends: Vec<BackendDescriptor>) -> Self {
        Self {
            backends,
            data_migration: false,
        }
    }

    pub fn with_data_migration(mut self, enabled: bool) -> Self {
        self.data_migration = enabled;
        self
    }

    /// Parse a JSON document.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid fallback storage config: {e}")))
    }
}

/// Describes one backend to build.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "config",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", rename_all = "snake_case")
)]
pub enum BackendDescriptor {
    /// A fresh [`MemoryStorage`](crate::MemoryStorage).
    Memory { base_url: Option<String> },

    /// A [`LocalStorage`](crate::LocalStorage) rooted at `root`.
    Local {
        root: PathBuf,
        base_url: Option<String>,
    },

    /// A backend registered with [`BackendResolver::register`].
    Named { name: String },
}

/// Resolves [`BackendDescriptor`]s to backend instances.
#[derive(Clone, Default)]
pub struct BackendResolver {
    named: HashMap<String, Arc<dyn Storage>>,
}

impl BackendResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `backend` available to [`BackendDescriptor::Named`] descriptors.
    pub fn register<S: Storage + 'static>(self, name: impl Into<String>, backend: S) -> Self {
        self.register_shared(name, Arc::new(backend))
    }

    /// Like [`register`](Self::register), for a backend that is already shared.
    pub fn register_shared(mut self, name: impl Into<String>, backend: Arc<dyn Storage>) -> Self {
        self.named.insert(name.into(), backend);
        self
    }

    /// Build or look up the backend for `descriptor`.
    pub fn resolve(&self, descriptor: &BackendDescriptor) -> Result<Arc<dyn Storage>> {
        match descriptor {
            BackendDescriptor::Memory { base_url } => Self::memory(base_url.as_deref()),
            BackendDescriptor::Local { root, base_url } => Self::local(root, base_url.as_deref()),
            BackendDescriptor::Named { name } => self
                .named
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Configuration(format!("unknown storage backend: {name}"))),
        }
    }

    #[cfg(feature = "memory")]
    fn memory(base_url: Option<&str>) -> Result<Arc<dyn Storage>> {
        let storage = crate::MemoryStorage::new();
        Ok(match base_url {
            Some(url) => Arc::new(storage.with_base_url(url)),
            None => Arc::new(storage),
        })
    }

    #[cfg(not(feature = "memory"))]
    fn memory(_base_url: Option<&str>) -> Result<Arc<dyn Storage>> {
        Err(Error::Configuration(
            "memory backend requires the `memory` feature".to_string(),
        ))
    }

    #[cfg(feature = "local")]
    fn local(root: &std::path::Path, base_url: Option<&str>) -> Result<Arc<dyn Storage>> {
        let storage = crate::LocalStorage::new(root);
        Ok(match base_url {
            Some(url) => Arc::new(storage.with_base_url(url)),
            None => Arc::new(storage),
        })
    }

    #[cfg(not(feature = "local"))]
    fn local(_root: &std::path::Path, _base_url: Option<&str>) -> Result<Arc<dyn Storage>> {
        Err(Error::Configuration(
            "local backend requires the `local` feature".to_string(),
        ))
    }
}

impl fmt::Debug for BackendResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.named.keys().collect();
        names.sort();
        f.debug_struct("BackendResolver")
            .field("named", &names)
            .finish()
    }
}
