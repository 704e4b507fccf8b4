//! Collaborators the deny resolver reads from and writes to.
//!
//! Each platform facility is a trait so tests can substitute doubles. The
//! directory/JSON implementations back the standalone binary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use adpolicy_core::error::{AdPolicyError, Result};

use super::cache::DenyGroupCache;

/// One downloaded file inside a file group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFile {
    pub file_id: String,
    pub file_uri: String,
}

/// A named set of downloaded files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFileGroup {
    pub group_name: String,
    pub files: Vec<ClientFile>,
}

/// Source of downloaded file groups. `Ok(None)` means nothing downloaded yet.
#[async_trait]
pub trait DenyFileSource: Send + Sync {
    async fn file_group(&self, group_name: &str) -> Result<Option<ClientFileGroup>>;
}

/// Reads a downloaded file by URI.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn read(&self, uri: &str) -> Result<Bytes>;
}

/// An installed package and its version code (0 when unknown).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    pub version_code: u64,
}

#[async_trait]
pub trait InstalledPackages: Send + Sync {
    async fn installed_packages(&self) -> Result<Vec<InstalledPackage>>;
}

/// Durable copy of the deny cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self) -> Result<Option<DenyGroupCache>>;
    async fn store(&self, cache: &DenyGroupCache) -> Result<()>;
}

/// File groups laid out as `<root>/<group_name>/<file_id>`.
pub struct DirectoryFileSource {
    root: PathBuf,
}

impl DirectoryFileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DenyFileSource for DirectoryFileSource {
    async fn file_group(&self, group_name: &str) -> Result<Option<ClientFileGroup>> {
        let dir = self.root.join(group_name);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_id = entry.file_name().to_string_lossy().into_owned();
            let file_uri = entry.path().to_string_lossy().into_owned();
            files.push(ClientFile { file_id, file_uri });
        }
        files.sort_by(|a, b| a.file_id.cmp(&b.file_id));

        Ok(Some(ClientFileGroup {
            group_name: group_name.to_string(),
            files,
        }))
    }
}

/// Reads URIs as local paths.
#[derive(Default)]
pub struct LocalFileStorage;

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn read(&self, uri: &str) -> Result<Bytes> {
        let raw = tokio::fs::read(Path::new(uri)).await?;
        Ok(Bytes::from(raw))
    }
}

/// Installed packages listed in a JSON object `{ "package": version_code }`.
pub struct JsonInstalledPackages {
    path: PathBuf,
}

impl JsonInstalledPackages {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl InstalledPackages for JsonInstalledPackages {
    async fn installed_packages(&self) -> Result<Vec<InstalledPackage>> {
        let raw = tokio::fs::read(&self.path).await?;
        let map: HashMap<String, u64> = serde_json::from_slice(&raw)
            .map_err(|e| AdPolicyError::BadRequest(format!("invalid installed packages: {e}")))?;
        Ok(map
            .into_iter()
            .map(|(name, version_code)| InstalledPackage { name, version_code })
            .collect())
    }
}

/// Cache persisted as JSON, replaced atomically through a temp file.
pub struct JsonFileCacheStore {
    path: PathBuf,
}

impl JsonFileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CacheStore for JsonFileCacheStore {
    async fn load(&self) -> Result<Option<DenyGroupCache>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let cache = serde_json::from_slice(&raw)
            .map_err(|e| AdPolicyError::Io(format!("corrupt deny cache: {e}")))?;
        Ok(Some(cache))
    }

    async fn store(&self, cache: &DenyGroupCache) -> Result<()> {
        let raw = serde_json::to_vec(cache)
            .map_err(|e| AdPolicyError::Internal(format!("encode deny cache: {e}")))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Process-local store, used when no cache path is configured.
#[derive(Default)]
pub struct MemoryCacheStore {
    inner: RwLock<Option<DenyGroupCache>>,
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn load(&self) -> Result<Option<DenyGroupCache>> {
        Ok(self.inner.read().await.clone())
    }

    async fn store(&self, cache: &DenyGroupCache) -> Result<()> {
        *self.inner.write().await = Some(cache.clone());
        Ok(())
    }
}
