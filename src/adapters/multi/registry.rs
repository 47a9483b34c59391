use crate::config::{BackendResolver, FallbackConfig};
use crate::{Error, Result, Storage};
use std::sync::Arc;

/// An ordered, immutable list of storage backends.
///
/// Index 0 is the primary backend. The order is fixed at construction and
/// decides which backend wins when several could answer.
#[derive(Debug, Clone)]
pub struct Registry {
    backends: Vec<Arc<dyn Storage>>,
}

impl Registry {
    /// Create a registry from backends in priority order.
    ///
    /// Fails with [`Error::Configuration`] when `backends` is empty.
    pub fn new(backends: Vec<Arc<dyn Storage>>) -> Result<Self> {
        if backends.is_empty() {
            return Err(Error::Configuration(
                "at least one storage backend is required".to_string(),
            ));
        }
        Ok(Self { backends })
    }

    /// Resolve every descriptor in `config`, in order.
    pub fn from_config(config: &FallbackConfig, resolver: &BackendResolver) -> Result<Self> {
        let backends = config
            .backends
            .iter()
            .enumerate()
            .map(|(index, descriptor)| {
                resolver.resolve(descriptor).inspect_err(|e| {
                    tracing::error!(backend = index, ?descriptor, error = %e, "Unable to resolve backend");
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(backends)
    }

    /// Get the number of backends.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// The primary (first) backend.
    pub fn primary(&self) -> &dyn Storage {
        self.backends[0].as_ref()
    }

    /// The lowest-priority (last) backend.
    pub fn last(&self) -> &dyn Storage {
        self.backends[self.backends.len() - 1].as_ref()
    }

    /// Get a reference to a specific backend by index.
    pub fn get(&self, index: usize) -> Option<&dyn Storage> {
        self.backends.get(index).map(|arc| arc.as_ref())
    }

    /// Iterate over `(index, backend)` in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &dyn Storage)> + '_ {
        self.backends
            .iter()
            .enumerate()
            .map(|(index, arc)| (index, arc.as_ref()))
    }
}
