//! Opportunistic migration of files into the primary backend.
//!
//! With data migration enabled, a file that is opened from any backend other
//! than the primary is saved back through [`FallbackStorage`], which routes
//! the write to the first backend that accepts it. Repeated reads therefore
//! converge on the primary without a separate bulk migration step.
//!
//! Migration is best-effort: a failed save is logged and the open still
//! succeeds. Nothing is queued or retried; the next access simply tries again.

use bytes::Bytes;

use super::fallback::FallbackStorage;
use crate::{OpenMode, Operation, Result, Storage, StoredFile};

impl FallbackStorage {
    /// Open `name`, migrating it into the primary backend when it was served
    /// by a secondary one.
    pub(super) async fn open_and_migrate(&self, name: &str, mode: OpenMode) -> Result<StoredFile> {
        let hit = self
            .registry()
            .first_success(Operation::Open, |b| b.open(name, mode))
            .await?;

        if hit.index == 0 {
            return Ok(hit.value);
        }

        match mode {
            OpenMode::Read => {
                let content = hit.value.into_bytes().await?;
                self.migrate(name, content.clone(), hit.index).await;
                Ok(StoredFile::from_bytes(name, content))
            }
            OpenMode::ReadWrite => {
                // The caller keeps the writable handle; copy from a second,
                // read-only handle instead.
                match hit.backend.open(name, OpenMode::Read).await {
                    Ok(copy) => match copy.into_bytes().await {
                        Ok(content) => self.migrate(name, content, hit.index).await,
                        Err(e) => {
                            tracing::error!(name, ?mode, source = hit.index, error = ?e, "Unable to read file for migration");
                        }
                    },
                    Err(e) => {
                        tracing::error!(name, ?mode, source = hit.index, error = ?e, "Unable to reopen file for migration");
                    }
                }
                Ok(hit.value)
            }
        }
    }

    /// Save `content` through the fallback chain, logging instead of failing.
    async fn migrate(&self, name: &str, content: Bytes, source: usize) {
        match self.save(name, content).await {
            Ok(stored) => {
                tracing::info!(name, stored = %stored, source, "Migrated file into primary storage");
            }
            Err(e) => {
                tracing::error!(name, source, error = ?e, "Unable to save file into the primary backend when fetched from other backend");
            }
        }
    }
}
