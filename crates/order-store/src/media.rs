//! Blob storage for raw photo bytes.
//!
//! Photos are addressed by an opaque storage locator returned from
//! [`MediaStore::put`]. The order store keeps only the locator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{Result, StoreError};

/// Storage for photo bytes keyed by opaque locators.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores `bytes` and returns the locator to read them back.
    async fn put(&self, order_id: &OrderId, filename: &str, bytes: &[u8]) -> Result<String>;

    /// Reads the bytes stored under `locator`.
    async fn get(&self, locator: &str) -> Result<Vec<u8>>;

    /// Removes the blob stored under `locator`.
    async fn remove(&self, locator: &str) -> Result<()>;
}

#[async_trait]
impl<T: MediaStore + ?Sized> MediaStore for Arc<T> {
    async fn put(&self, order_id: &OrderId, filename: &str, bytes: &[u8]) -> Result<String> {
        (**self).put(order_id, filename, bytes).await
    }

    async fn get(&self, locator: &str) -> Result<Vec<u8>> {
        (**self).get(locator).await
    }

    async fn remove(&self, locator: &str) -> Result<()> {
        (**self).remove(locator).await
    }
}

/// Builds a unique blob name that keeps the original extension.
fn blob_name(order_id: &OrderId, filename: &str) -> String {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "jpg".to_string());
    format!("{}_{}.{ext}", order_id, Uuid::new_v4().simple())
}

/// Filesystem media store rooted at one directory.
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    /// Creates the root directory if needed and returns a ready store.
    pub async fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        tracing::info!(root = %root.display(), "media store ready");
        Ok(Self { root })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a locator to a path inside the root. Locators are plain file
    /// names; anything that could escape the root is treated as unknown.
    fn resolve(&self, locator: &str) -> Result<PathBuf> {
        let valid = !locator.is_empty()
            && !locator.starts_with('.')
            && locator
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(StoreError::MediaNotFound(locator.to_string()));
        }
        Ok(self.root.join(locator))
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn put(&self, order_id: &OrderId, filename: &str, bytes: &[u8]) -> Result<String> {
        let locator = blob_name(order_id, filename);
        let path = self.resolve(&locator)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(locator)
    }

    async fn get(&self, locator: &str) -> Result<Vec<u8>> {
        let path = self.resolve(locator)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::MediaNotFound(locator.to_string()),
            _ => StoreError::Io(e),
        })
    }

    async fn remove(&self, locator: &str) -> Result<()> {
        let path = self.resolve(locator)?;
        tokio::fs::remove_file(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::MediaNotFound(locator.to_string()),
            _ => StoreError::Io(e),
        })
    }
}

/// In-memory media store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMediaStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryMediaStore {
    /// Creates a new empty in-memory media store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored blobs.
    pub async fn blob_count(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn put(&self, order_id: &OrderId, filename: &str, bytes: &[u8]) -> Result<String> {
        let locator = blob_name(order_id, filename);
        self.blobs
            .write()
            .await
            .insert(locator.clone(), bytes.to_vec());
        Ok(locator)
    }

    async fn get(&self, locator: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(locator)
            .cloned()
            .ok_or_else(|| StoreError::MediaNotFound(locator.to_string()))
    }

    async fn remove(&self, locator: &str) -> Result<()> {
        self.blobs
            .write()
            .await
            .remove(locator)
            .map(|_| ())
            .ok_or_else(|| StoreError::MediaNotFound(locator.to_string()))
    }
}
