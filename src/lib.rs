use std::fmt::{self, Debug};
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

#[cfg(feature = "memory")]
pub use adapters::memory::MemoryStorage;

#[cfg(feature = "local")]
pub use adapters::local::LocalStorage;

pub use adapters::multi;
pub use adapters::multi::{FallbackStorage, FallbackStorageBuilder, Registry};
pub use config::{BackendDescriptor, BackendResolver, FallbackConfig};

pub mod config;
pub mod names;

/// A specialized Result type for Storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A unified Error type for storage operations.
///
/// Errors raised by a backend travel through [`FallbackStorage`] unchanged, so
/// callers can keep matching on the variant a particular backend produces.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Storage backend connection error")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("IO Error")]
    Io(#[from] std::io::Error),

    #[error("Generic storage error: {0}")]
    Generic(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(Operation),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// True for [`Error::NotFound`] and for I/O errors of kind `NotFound`.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// True when the backend does not implement the operation at all.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported(_))
    }
}

/// The operations a [`Storage`] backend may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Open,
    Save,
    Delete,
    Exists,
    Listdir,
    Size,
    Url,
    AccessedTime,
    CreatedTime,
    ModifiedTime,
    GetValidName,
    GetAvailableName,
    Path,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Open => "open",
            Operation::Save => "save",
            Operation::Delete => "delete",
            Operation::Exists => "exists",
            Operation::Listdir => "listdir",
            Operation::Size => "size",
            Operation::Url => "url",
            Operation::AccessedTime => "accessed_time",
            Operation::CreatedTime => "created_time",
            Operation::ModifiedTime => "modified_time",
            Operation::GetValidName => "get_valid_name",
            Operation::GetAvailableName => "get_available_name",
            Operation::Path => "path",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a file is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only access. The returned handle may be buffered freely.
    #[default]
    Read,
    /// Read-write access. The handle is tied to the backend that produced it.
    ReadWrite,
}

/// Result of listing a directory: immediate subdirectories and files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

impl Listing {
    pub fn new(directories: Vec<String>, files: Vec<String>) -> Self {
        Self { directories, files }
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}

/// An open file returned by [`Storage::open`].
///
/// Implements Tokio's [`AsyncRead`]; the content is streamed from whatever
/// reader the backend supplied.
pub struct StoredFile {
    name: String,
    reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl StoredFile {
    /// Wrap a backend reader.
    pub fn new<R>(name: impl Into<String>, reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            name: name.into(),
            reader: Box::pin(reader),
        }
    }

    /// A file whose content is already in memory.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::new(name, std::io::Cursor::new(data.into()))
    }

    /// The name the file was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the remaining content into memory.
    pub async fn into_bytes(mut self) -> Result<Bytes> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

impl AsyncRead for StoredFile {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.get_mut().reader.as_mut().poll_read(cx, buf)
    }
}

impl Debug for StoredFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredFile")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Adapter modules, gated behind Cargo features.
pub mod adapters {
    #[cfg(feature = "local")]
    pub mod local;
    #[cfg(feature = "memory")]
    pub mod memory;
    pub mod multi;
}

/// The storage capability interface.
///
/// Every method has a default body returning [`Error::Unsupported`], so a
/// backend implements only the operations it actually supports. Composite
/// storages tell "this backend cannot do that" apart from "this backend tried
/// and failed" by that variant alone.
///
/// ```
/// use async_trait::async_trait;
/// use fallback_storage::{Result, Storage};
///
/// #[derive(Debug)]
/// struct Constant;
///
/// #[async_trait]
/// impl Storage for Constant {
///     async fn exists(&self, _name: &str) -> Result<bool> {
///         Ok(true)
///     }
/// }
/// ```
#[async_trait]
pub trait Storage: Send + Sync + Debug {
    /// Open a file for reading.
    async fn open(&self, _name: &str, _mode: OpenMode) -> Result<StoredFile> {
        Err(Error::Unsupported(Operation::Open))
    }

    /// Store `content` under `name`. Returns the name actually used.
    async fn save(&self, _name: &str, _content: Bytes) -> Result<String> {
        Err(Error::Unsupported(Operation::Save))
    }

    /// Delete a file.
    async fn delete(&self, _name: &str) -> Result<()> {
        Err(Error::Unsupported(Operation::Delete))
    }

    /// Check if a file exists.
    async fn exists(&self, _name: &str) -> Result<bool> {
        Err(Error::Unsupported(Operation::Exists))
    }

    /// List the immediate contents of a directory (`""` is the root).
    async fn listdir(&self, _path: &str) -> Result<Listing> {
        Err(Error::Unsupported(Operation::Listdir))
    }

    /// Size of a file in bytes.
    async fn size(&self, _name: &str) -> Result<u64> {
        Err(Error::Unsupported(Operation::Size))
    }

    /// URL at which the file can be retrieved.
    async fn url(&self, _name: &str) -> Result<String> {
        Err(Error::Unsupported(Operation::Url))
    }

    async fn accessed_time(&self, _name: &str) -> Result<DateTime<Utc>> {
        Err(Error::Unsupported(Operation::AccessedTime))
    }

    async fn created_time(&self, _name: &str) -> Result<DateTime<Utc>> {
        Err(Error::Unsupported(Operation::CreatedTime))
    }

    async fn modified_time(&self, _name: &str) -> Result<DateTime<Utc>> {
        Err(Error::Unsupported(Operation::ModifiedTime))
    }

    /// A sanitized version of `name` that the backend accepts.
    async fn get_valid_name(&self, _name: &str) -> Result<String> {
        Err(Error::Unsupported(Operation::GetValidName))
    }

    /// A name based on `name` that is free on this backend.
    async fn get_available_name(&self, _name: &str) -> Result<String> {
        Err(Error::Unsupported(Operation::GetAvailableName))
    }

    /// Local filesystem path of the file. Only meaningful for local backends.
    async fn path(&self, _name: &str) -> Result<PathBuf> {
        Err(Error::Unsupported(Operation::Path))
    }
}

/// Convenience methods built on [`Storage`].
pub trait StorageExt: Storage {
    /// Read a whole file into memory.
    fn read_bytes(&self, name: &str) -> impl std::future::Future<Output = Result<Bytes>> + Send {
        async move { self.open(name, OpenMode::Read).await?.into_bytes().await }
    }

    /// Read a whole file as a UTF-8 string.
    fn read_string(&self, name: &str) -> impl std::future::Future<Output = Result<String>> + Send {
        async move {
            let bytes = self.read_bytes(name).await?;
            String::from_utf8(bytes.to_vec())
                .map_err(|e| Error::Generic(format!("invalid utf-8: {e}")))
        }
    }

    /// Save a byte slice.
    fn save_bytes(
        &self,
        name: &str,
        bytes: &[u8],
    ) -> impl std::future::Future<Output = Result<String>> + Send {
        let content = Bytes::copy_from_slice(bytes);
        async move { self.save(name, content).await }
    }

    /// Buffer `reader` fully, then save it.
    fn save_reader<R: AsyncRead + Send + Unpin>(
        &self,
        name: &str,
        mut reader: R,
    ) -> impl std::future::Future<Output = Result<String>> + Send {
        async move {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).await?;
            self.save(name, Bytes::from(buf)).await
        }
    }

    /// Copy a file from this storage into `dest`, returning the name `dest` stored it under.
    fn copy_to<S2: Storage + ?Sized>(
        &self,
        name: &str,
        dest: &S2,
    ) -> impl std::future::Future<Output = Result<String>> + Send {
        async move {
            let content = self.read_bytes(name).await?;
            dest.save(name, content).await
        }
    }
}

impl<T: Storage + ?Sized> StorageExt for T {}
