//! Multi-storage adapters for combining multiple storage backends.
//!
//! [`FallbackStorage`] implements the [`Storage`](crate::Storage) trait on top
//! of an ordered [`Registry`] of backends. Each operation walks the registry in
//! order, one backend at a time, and combines the results:
//!
//! | Operation | Policy |
//! |---|---|
//! | `open`, `save`, `delete`, `size`, timestamps, `path`, name helpers | first backend to succeed wins |
//! | `exists` | true if any backend reports true; never fails |
//! | `listdir` | union of every backend that could list the path |
//! | `url` | first backend that holds the file, else the last backend |
//!
//! A backend returning [`Error::Unsupported`](crate::Error::Unsupported) is
//! skipped without counting as a failure. When nothing succeeds the last
//! failure is returned as the backend produced it.
//!
//! With data migration enabled, files read from any backend other than the
//! primary (index 0) are saved back through the storage so later reads hit
//! the primary.
//!
//! # Example
//!
//! ```
//! # async fn example() -> fallback_storage::Result<()> {
//! use fallback_storage::{FallbackStorage, MemoryStorage, Storage, StorageExt};
//!
//! let fast = MemoryStorage::new();
//! let legacy = MemoryStorage::new();
//! legacy.save_bytes("a.jpg", b"jpeg").await?;
//!
//! let storage = FallbackStorage::builder()
//!     .add_backend(fast.clone())
//!     .add_backend(legacy)
//!     .data_migration(true)
//!     .build()?;
//!
//! assert_eq!(&storage.read_bytes("a.jpg").await?[..], b"jpeg");
//! assert!(fast.exists("a.jpg").await?);
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod fallback;
mod migration;
mod registry;

pub use fallback::{FallbackStorage, FallbackStorageBuilder};
pub use registry::Registry;
