//! Ordered fallback across the backends of a [`Registry`].

use std::collections::BTreeSet;

use futures::future::BoxFuture;

use super::registry::Registry;
use crate::{Error, Listing, Operation, Result, Storage};

/// How a single backend call turned out.
#[derive(Debug)]
pub(crate) enum Outcome<T> {
    Success(T),
    Unsupported,
    NotFound(Error),
    Failure(Error),
}

impl<T> Outcome<T> {
    pub(crate) fn classify(result: Result<T>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(e) if e.is_unsupported() => Outcome::Unsupported,
            Err(e) if e.is_not_found() => Outcome::NotFound(e),
            Err(e) => Outcome::Failure(e),
        }
    }
}

/// The non-successful outcomes of one dispatch.
///
/// Only the last failure and the last not-found error are kept; a failure
/// always outranks not-found, and not-found outranks "nobody supports this".
#[derive(Debug)]
pub(crate) struct Attempts {
    operation: Operation,
    last_failure: Option<Error>,
    last_not_found: Option<Error>,
}

impl Attempts {
    pub(crate) fn new(operation: Operation) -> Self {
        Self {
            operation,
            last_failure: None,
            last_not_found: None,
        }
    }

    /// Record the outcome from backend `index`, handing back the value on success.
    pub(crate) fn record<T>(&mut self, index: usize, outcome: Outcome<T>) -> Option<T> {
        match outcome {
            Outcome::Success(value) => Some(value),
            Outcome::Unsupported => {
                tracing::trace!(backend = index, operation = %self.operation, "Backend does not support operation");
                None
            }
            Outcome::NotFound(e) => {
                tracing::debug!(backend = index, operation = %self.operation, error = %e, "Not found, trying next backend");
                self.last_not_found = Some(e);
                None
            }
            Outcome::Failure(e) => {
                tracing::warn!(backend = index, operation = %self.operation, error = ?e, "Backend failed, using fallback");
                self.last_failure = Some(e);
                None
            }
        }
    }

    /// The error to surface when no backend succeeded.
    pub(crate) fn into_error(self) -> Error {
        self.last_failure
            .or(self.last_not_found)
            .unwrap_or(Error::Unsupported(self.operation))
    }
}

/// The backend that answered a first-success dispatch.
pub(crate) struct Hit<'a, T> {
    pub(crate) index: usize,
    pub(crate) backend: &'a dyn Storage,
    pub(crate) value: T,
}

impl Registry {
    /// Call `call` on each backend in order and return the first success.
    pub(crate) async fn first_success<'a, T, F>(
        &'a self,
        operation: Operation,
        call: F,
    ) -> Result<Hit<'a, T>>
    where
        F: Fn(&'a dyn Storage) -> BoxFuture<'a, Result<T>>,
    {
        let mut attempts = Attempts::new(operation);

        for (index, backend) in self.iter() {
            let outcome = Outcome::classify(call(backend).await);
            if let Some(value) = attempts.record(index, outcome) {
                if index > 0 {
                    tracing::debug!(backend = index, %operation, "Served by fallback backend");
                }
                return Ok(Hit {
                    index,
                    backend,
                    value,
                });
            }
        }

        Err(attempts.into_error())
    }

    /// True if any backend reports that `name` exists.
    ///
    /// Backends that fail are logged and treated as not holding the file.
    pub(crate) async fn any_exists(&self, name: &str) -> bool {
        for (index, backend) in self.iter() {
            match Outcome::classify(backend.exists(name).await) {
                Outcome::Success(true) => return true,
                Outcome::Success(false) | Outcome::Unsupported | Outcome::NotFound(_) => {}
                Outcome::Failure(e) => {
                    tracing::warn!(backend = index, name, error = ?e, "Existence check failed, treating as absent");
                }
            }
        }
        false
    }

    /// Union of the listings of every backend that can list `path`.
    ///
    /// Fails only when no backend produced a listing at all.
    pub(crate) async fn union_listings(&self, path: &str) -> Result<Listing> {
        let mut attempts = Attempts::new(Operation::Listdir);
        let mut listed = false;
        let mut directories = BTreeSet::new();
        let mut files = BTreeSet::new();

        for (index, backend) in self.iter() {
            let outcome = Outcome::classify(backend.listdir(path).await);
            if let Some(listing) = attempts.record(index, outcome) {
                listed = true;
                directories.extend(listing.directories);
                files.extend(listing.files);
            }
        }

        if !listed {
            return Err(attempts.into_error());
        }

        Ok(Listing::new(
            directories.into_iter().collect(),
            files.into_iter().collect(),
        ))
    }
}
