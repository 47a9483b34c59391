//! Common test utilities, stub backends and a reusable test suite for storage adapters.
//!
//! The macro `storage_test_suite!` generates a set of tests for any Storage
//! implementation that supports the full read/write surface.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use fallback_storage::{
    Error, Listing, OpenMode, Operation, Result, Storage, StorageExt, StoredFile,
};

/// Macro to generate a complete test suite for a Storage implementation.
///
/// # Usage
///
/// ```ignore
/// storage_test_suite!(
///     setup = async {
///         // Your storage setup code here
///         MyStorage::new()
///     }
/// );
/// ```
#[macro_export]
macro_rules! storage_test_suite {
    (
        setup = $setup:expr
    ) => {
        mod storage_test_suite {
            use super::*;
            use $crate::test_common::*;

            #[tokio::test]
            async fn test_save_and_exists() {
                let (storage, _guard) = $setup.await;
                run_test_save_and_exists(&storage).await;
            }

            #[tokio::test]
            async fn test_save_and_read_bytes() {
                let (storage, _guard) = $setup.await;
                run_test_save_and_read_bytes(&storage).await;
            }

            #[tokio::test]
            async fn test_open_nonexistent() {
                let (storage, _guard) = $setup.await;
                run_test_open_nonexistent(&storage).await;
            }

            #[tokio::test]
            async fn test_delete_existing() {
                let (storage, _guard) = $setup.await;
                run_test_delete_existing(&storage).await;
            }

            #[tokio::test]
            async fn test_delete_idempotent() {
                let (storage, _guard) = $setup.await;
                run_test_delete_idempotent(&storage).await;
            }

            #[tokio::test]
            async fn test_overwrite() {
                let (storage, _guard) = $setup.await;
                run_test_overwrite(&storage).await;
            }

            #[tokio::test]
            async fn test_empty_data() {
                let (storage, _guard) = $setup.await;
                run_test_empty_data(&storage).await;
            }

            #[tokio::test]
            async fn test_binary_data() {
                let (storage, _guard) = $setup.await;
                run_test_binary_data(&storage).await;
            }

            #[tokio::test]
            async fn test_size_and_timestamps() {
                let (storage, _guard) = $setup.await;
                run_test_size_and_timestamps(&storage).await;
            }

            #[tokio::test]
            async fn test_listdir() {
                let (storage, _guard) = $setup.await;
                run_test_listdir(&storage).await;
            }

            #[tokio::test]
            async fn test_names() {
                let (storage, _guard) = $setup.await;
                run_test_names(&storage).await;
            }
        }
    };
}

// Individual test implementations that can be reused

pub async fn run_test_save_and_exists<S: Storage>(storage: &S) {
    assert!(!storage.exists("test.txt").await.unwrap());

    let stored = storage.save_bytes("test.txt", b"hello world").await.unwrap();
    assert_eq!(stored, "test.txt");

    assert!(storage.exists("test.txt").await.unwrap());
}

pub async fn run_test_save_and_read_bytes<S: Storage>(storage: &S) {
    storage.save_bytes("test.txt", b"hello world").await.unwrap();

    let retrieved = storage.read_bytes("test.txt").await.unwrap();
    assert_eq!(&retrieved[..], b"hello world");
    assert_eq!(storage.read_string("test.txt").await.unwrap(), "hello world");
}

pub async fn run_test_open_nonexistent<S: Storage>(storage: &S) {
    let result = storage.open("nonexistent.txt", OpenMode::Read).await;
    assert!(matches!(result.unwrap_err(), Error::NotFound(_)));
}

pub async fn run_test_delete_existing<S: Storage>(storage: &S) {
    storage.save_bytes("test.txt", b"hello world").await.unwrap();
    assert!(storage.exists("test.txt").await.unwrap());

    storage.delete("test.txt").await.unwrap();
    assert!(!storage.exists("test.txt").await.unwrap());
}

pub async fn run_test_delete_idempotent<S: Storage>(storage: &S) {
    // Delete non-existent file should not error
    storage.delete("test.txt").await.unwrap();
    storage.delete("test.txt").await.unwrap();
}

pub async fn run_test_overwrite<S: Storage>(storage: &S) {
    storage.save_bytes("test.txt", b"original").await.unwrap();
    storage.save_bytes("test.txt", b"updated").await.unwrap();

    let retrieved = storage.read_bytes("test.txt").await.unwrap();
    assert_eq!(&retrieved[..], b"updated");
}

pub async fn run_test_empty_data<S: Storage>(storage: &S) {
    storage.save_bytes("empty.txt", b"").await.unwrap();

    assert!(storage.exists("empty.txt").await.unwrap());
    assert_eq!(storage.size("empty.txt").await.unwrap(), 0);
    assert!(storage.read_bytes("empty.txt").await.unwrap().is_empty());
}

pub async fn run_test_binary_data<S: Storage>(storage: &S) {
    let data: Vec<u8> = (0..=255).collect();
    storage.save_bytes("binary.dat", &data).await.unwrap();

    let retrieved = storage.read_bytes("binary.dat").await.unwrap();
    assert_eq!(&retrieved[..], &data[..]);
}

pub async fn run_test_size_and_timestamps<S: Storage>(storage: &S) {
    let before = Utc::now() - chrono::Duration::seconds(5);
    storage.save_bytes("sized.txt", b"0123456789").await.unwrap();

    assert_eq!(storage.size("sized.txt").await.unwrap(), 10);
    assert!(storage.modified_time("sized.txt").await.unwrap() >= before);
    assert!(storage.accessed_time("sized.txt").await.unwrap() >= before);

    assert!(storage.size("missing.txt").await.unwrap_err().is_not_found());
    assert!(
        storage
            .modified_time("missing.txt")
            .await
            .unwrap_err()
            .is_not_found()
    );
}

pub async fn run_test_listdir<S: Storage>(storage: &S) {
    storage.save_bytes("top.txt", b"1").await.unwrap();
    storage.save_bytes("docs/a.txt", b"2").await.unwrap();
    storage.save_bytes("docs/nested/b.txt", b"3").await.unwrap();

    let root = storage.listdir("").await.unwrap();
    assert_eq!(root.directories, vec!["docs"]);
    assert_eq!(root.files, vec!["top.txt"]);

    let docs = storage.listdir("docs").await.unwrap();
    assert_eq!(docs.directories, vec!["nested"]);
    assert_eq!(docs.files, vec!["a.txt"]);

    assert!(storage.listdir("nope").await.unwrap_err().is_not_found());
}

pub async fn run_test_names<S: Storage>(storage: &S) {
    assert_eq!(
        storage.get_valid_name("my file?.txt").await.unwrap(),
        "my_file.txt"
    );

    assert_eq!(storage.get_available_name("n.txt").await.unwrap(), "n.txt");
    storage.save_bytes("n.txt", b"x").await.unwrap();
    storage.save_bytes("n_1.txt", b"x").await.unwrap();
    assert_eq!(storage.get_available_name("n.txt").await.unwrap(), "n_2.txt");
}

// Stub backends for exercising the fallback policies

/// A backend that implements nothing.
#[derive(Debug, Default)]
pub struct BareStorage;

impl Storage for BareStorage {}

/// A backend whose every operation fails with [`Error::Generic`] carrying `label`.
#[derive(Debug)]
pub struct FailingStorage {
    pub label: &'static str,
}

impl FailingStorage {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(Error::Generic(self.label.to_string()))
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn open(&self, _name: &str, _mode: OpenMode) -> Result<StoredFile> {
        self.fail()
    }

    async fn save(&self, _name: &str, _content: Bytes) -> Result<String> {
        self.fail()
    }

    async fn delete(&self, _name: &str) -> Result<()> {
        self.fail()
    }

    async fn exists(&self, _name: &str) -> Result<bool> {
        self.fail()
    }

    async fn listdir(&self, _path: &str) -> Result<Listing> {
        self.fail()
    }

    async fn size(&self, _name: &str) -> Result<u64> {
        self.fail()
    }

    async fn url(&self, _name: &str) -> Result<String> {
        self.fail()
    }

    async fn accessed_time(&self, _name: &str) -> Result<DateTime<Utc>> {
        self.fail()
    }

    async fn created_time(&self, _name: &str) -> Result<DateTime<Utc>> {
        self.fail()
    }

    async fn modified_time(&self, _name: &str) -> Result<DateTime<Utc>> {
        self.fail()
    }

    async fn get_valid_name(&self, _name: &str) -> Result<String> {
        self.fail()
    }

    async fn get_available_name(&self, _name: &str) -> Result<String> {
        self.fail()
    }

    async fn path(&self, _name: &str) -> Result<PathBuf> {
        self.fail()
    }
}

/// A backend that reports holding every name and supports nothing else,
/// except optionally a `url` that always fails.
#[derive(Debug, Default)]
pub struct HoldingStorage {
    failing_url: Option<&'static str>,
}

impl HoldingStorage {
    pub fn without_url() -> Self {
        Self::default()
    }

    pub fn with_failing_url(label: &'static str) -> Self {
        Self {
            failing_url: Some(label),
        }
    }
}

#[async_trait]
impl Storage for HoldingStorage {
    async fn exists(&self, _name: &str) -> Result<bool> {
        Ok(true)
    }

    async fn url(&self, _name: &str) -> Result<String> {
        match self.failing_url {
            Some(label) => Err(Error::Generic(label.to_string())),
            None => Err(Error::Unsupported(Operation::Url)),
        }
    }
}

/// Wraps a backend, counts calls per operation and can be told to reject saves.
#[derive(Debug)]
pub struct RecordingStorage<S> {
    inner: S,
    reject_saves: bool,
    calls: Mutex<HashMap<Operation, usize>>,
}

impl<S: Storage> RecordingStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reject_saves: false,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn rejecting_saves(mut self) -> Self {
        self.reject_saves = true;
        self
    }

    pub fn calls(&self, op: Operation) -> usize {
        self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
    }

    fn hit(&self, op: Operation) {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
    }
}

#[async_trait]
impl<S: Storage> Storage for RecordingStorage<S> {
    async fn open(&self, name: &str, mode: OpenMode) -> Result<StoredFile> {
        self.hit(Operation::Open);
        self.inner.open(name, mode).await
    }

    async fn save(&self, name: &str, content: Bytes) -> Result<String> {
        self.hit(Operation::Save);
        if self.reject_saves {
            return Err(Error::PermissionDenied("saves rejected".to_string()));
        }
        self.inner.save(name, content).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.hit(Operation::Delete);
        self.inner.delete(name).await
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        self.hit(Operation::Exists);
        self.inner.exists(name).await
    }

    async fn listdir(&self, path: &str) -> Result<Listing> {
        self.hit(Operation::Listdir);
        self.inner.listdir(path).await
    }

    async fn size(&self, name: &str) -> Result<u64> {
        self.hit(Operation::Size);
        self.inner.size(name).await
    }

    async fn url(&self, name: &str) -> Result<String> {
        self.hit(Operation::Url);
        self.inner.url(name).await
    }

    async fn modified_time(&self, name: &str) -> Result<DateTime<Utc>> {
        self.hit(Operation::ModifiedTime);
        self.inner.modified_time(name).await
    }

    async fn path(&self, name: &str) -> Result<PathBuf> {
        self.hit(Operation::Path);
        self.inner.path(name).await
    }
}
