use crate::{Error, Listing, OpenMode, Operation, Result, Storage, StoredFile, names};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::io::AsyncWriteExt;

const TEMP_SUFFIX: &str = ".tmp.fallback";

/// A local filesystem adapter.
///
/// - Names are *relative* paths (e.g. `"foo/bar.txt"`) stored under a configured root directory.
/// - Names are validated to prevent directory traversal (`..`) and absolute paths.
/// - `url` is only supported when a base URL is configured.
///
/// Files are opened as streaming Tokio handles; saves go through a temp file
/// that is renamed into place.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: Option<String>,
}

impl fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStorage")
            .field("root", &self.root)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl LocalStorage {
    /// Create a new local storage rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
        }
    }

    /// Serve URLs as `base_url` followed by the file name.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Return the configured root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::Generic("name cannot be empty".into()));
        }

        let p = Path::new(name);

        if p.is_absolute() {
            return Err(Error::PermissionDenied(format!(
                "absolute paths are not allowed: {name}"
            )));
        }

        // Disallow traversal and tricky prefixes.
        for c in p.components() {
            match c {
                Component::ParentDir => {
                    return Err(Error::PermissionDenied(format!(
                        "parent dir components ('..') are not allowed: {name}"
                    )));
                }
                Component::Prefix(_) => {
                    // Windows drive prefixes like C:\
                    return Err(Error::PermissionDenied(format!(
                        "path prefixes are not allowed: {name}"
                    )));
                }
                Component::RootDir => {
                    return Err(Error::PermissionDenied(format!(
                        "root dir component is not allowed: {name}"
                    )));
                }
                Component::CurDir | Component::Normal(_) => {}
            }
        }

        Ok(())
    }

    fn path_for_name(&self, name: &str) -> Result<PathBuf> {
        Self::validate_name(name)?;
        Ok(self.root.join(name))
    }

    fn dir_for_path(&self, path: &str) -> Result<PathBuf> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            Ok(self.root.clone())
        } else {
            self.path_for_name(trimmed)
        }
    }

    async fn ensure_parent_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn metadata(&self, name: &str) -> Result<std::fs::Metadata> {
        let path = self.path_for_name(name)?;
        match tokio::fs::metadata(&path).await {
            Ok(md) if md.is_file() => Ok(md),
            Ok(_) => Err(Error::NotFound(name.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A sibling temp path unique to this save, so concurrent saves never
    /// share one (`x.txt` and `x.jpg` included).
    fn temp_path_for(path: &Path) -> PathBuf {
        static NEXT: AtomicU64 = AtomicU64::new(0);

        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        let mut file_name = path.file_name().map(OsString::from).unwrap_or_default();
        file_name.push(format!(".{}.{n}{TEMP_SUFFIX}", std::process::id()));
        path.with_file_name(file_name)
    }

    fn timestamp(time: std::io::Result<SystemTime>, op: Operation) -> Result<DateTime<Utc>> {
        match time {
            Ok(t) => Ok(DateTime::<Utc>::from(t)),
            Err(e) if e.kind() == std::io::ErrorKind::Unsupported => Err(Error::Unsupported(op)),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn open(&self, name: &str, mode: OpenMode) -> Result<StoredFile> {
        let path = self.path_for_name(name)?;
        let result = match mode {
            OpenMode::Read => tokio::fs::File::open(&path).await,
            OpenMode::ReadWrite => {
                tokio::fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&path)
                    .await
            }
        };

        match result {
            Ok(file) => Ok(StoredFile::new(name, file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, name: &str, content: Bytes) -> Result<String> {
        let path = self.path_for_name(name)?;
        Self::ensure_parent_dir(&path).await?;

        // Write to a temp file then rename into place for a more atomic update.
        let tmp_path = Self::temp_path_for(&path);
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&content).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &path).await?;

        Ok(name.to_string())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for_name(name)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.path_for_name(name)?;
        match tokio::fs::metadata(path).await {
            Ok(md) => Ok(md.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn listdir(&self, path: &str) -> Result<Listing> {
        let dir = self.dir_for_path(path)?;
        let mut rd = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut listing = Listing::default();
        while let Some(entry) = rd.next_entry().await? {
            let Some(entry_name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!(path = ?entry.path(), "Skipping non-utf8 entry");
                continue;
            };
            let ty = entry.file_type().await?;
            if ty.is_file() && entry_name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            if ty.is_dir() {
                listing.directories.push(entry_name);
            } else if ty.is_file() {
                listing.files.push(entry_name);
            }
        }

        listing.directories.sort();
        listing.files.sort();
        Ok(listing)
    }

    async fn size(&self, name: &str) -> Result<u64> {
        Ok(self.metadata(name).await?.len())
    }

    async fn url(&self, name: &str) -> Result<String> {
        let base = self
            .base_url
            .as_deref()
            .ok_or(Error::Unsupported(Operation::Url))?;
        Self::validate_name(name)?;
        Ok(format!("{}/{}", base.trim_end_matches('/'), name))
    }

    async fn accessed_time(&self, name: &str) -> Result<DateTime<Utc>> {
        let md = self.metadata(name).await?;
        Self::timestamp(md.accessed(), Operation::AccessedTime)
    }

    async fn created_time(&self, name: &str) -> Result<DateTime<Utc>> {
        let md = self.metadata(name).await?;
        Self::timestamp(md.created(), Operation::CreatedTime)
    }

    async fn modified_time(&self, name: &str) -> Result<DateTime<Utc>> {
        let md = self.metadata(name).await?;
        Self::timestamp(md.modified(), Operation::ModifiedTime)
    }

    async fn get_valid_name(&self, name: &str) -> Result<String> {
        names::valid_name(name)
    }

    async fn get_available_name(&self, name: &str) -> Result<String> {
        names::available_name(name, |candidate| async move {
            let path = self.path_for_name(&candidate)?;
            Ok(tokio::fs::try_exists(path).await?)
        })
        .await
    }

    async fn path(&self, name: &str) -> Result<PathBuf> {
        self.path_for_name(name)
    }
}
