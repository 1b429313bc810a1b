//! Artifact storage for generated images.
//!
//! Backends:
//! - On-disk storage for deployments (served back over HTTP)
//! - In-memory storage for tests
//!
//! Implementation note:
//! This is a small wrapper around `object_store`, which already provides the
//! local filesystem and in-memory backends. Artifact names are flat file
//! names; anything that could escape the storage root is rejected.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use gen_core::env::{self, EnvError};
use gen_core::{ArtifactRef, GeneratedImage};
use object_store::ObjectStore;
use object_store::ObjectStoreExt;
use object_store::path::Path;
use ulid::Ulid;

/// Default directory for stored images.
pub const DEFAULT_ARTIFACT_DIR: &str = "./generated_images";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),

    #[error("invalid artifact name: {0:?}")]
    InvalidName(String),

    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object_store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

impl From<EnvError> for StorageError {
    fn from(err: EnvError) -> Self {
        StorageError::InvalidConfig(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Filesystem,
    Memory,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::Filesystem => "filesystem",
            StorageKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub enum StorageBackendConfig {
    Filesystem { root: PathBuf },
    Memory,
}

#[derive(Debug, Clone)]
pub struct ArtifactStoreConfig {
    pub backend: StorageBackendConfig,
    /// Optional key prefix applied to all artifact keys.
    pub prefix: Option<String>,
}

impl ArtifactStoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: StorageBackendConfig::Memory,
            prefix: None,
        }
    }

    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackendConfig::Filesystem { root: root.into() },
            prefix: None,
        }
    }

    /// Build a config from environment variables.
    ///
    /// - `ARTIFACT_BACKEND`: `filesystem` (default) or `memory`
    /// - `ARTIFACT_DIR`: filesystem root (default: `./generated_images`)
    /// - `ARTIFACT_PREFIX`: optional key prefix
    pub fn from_env() -> Result<Self, StorageError> {
        let prefix = env::optional("ARTIFACT_PREFIX");

        let cfg = match env::optional("ARTIFACT_BACKEND").as_deref() {
            None | Some("filesystem") | Some("fs") => {
                let root = env::optional("ARTIFACT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR));
                Self::filesystem(root)
            }
            Some("memory") | Some("mem") => Self::memory(),
            Some(other) => {
                return Err(StorageError::InvalidConfig(format!(
                    "unsupported ARTIFACT_BACKEND={other} (expected filesystem|memory)"
                )));
            }
        };

        Ok(Self { prefix, ..cfg })
    }
}

/// Store for generated images, keyed by flat file names.
#[derive(Clone)]
pub struct ArtifactStorage {
    kind: StorageKind,
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
}

impl ArtifactStorage {
    pub fn new(cfg: ArtifactStoreConfig) -> Result<Self, StorageError> {
        let (kind, store) = match cfg.backend {
            StorageBackendConfig::Filesystem { root } => {
                ensure_dir(&root)?;
                let fs = object_store::local::LocalFileSystem::new_with_prefix(&root)?;
                (StorageKind::Filesystem, Arc::new(fs) as Arc<dyn ObjectStore>)
            }
            StorageBackendConfig::Memory => {
                let mem = object_store::memory::InMemory::new();
                (StorageKind::Memory, Arc::new(mem) as Arc<dyn ObjectStore>)
            }
        };

        tracing::info!(backend = kind.as_str(), "Artifact storage ready");

        Ok(Self {
            kind,
            store,
            prefix: cfg.prefix.and_then(env::non_empty),
        })
    }

    pub fn from_env() -> Result<Self, StorageError> {
        Self::new(ArtifactStoreConfig::from_env()?)
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    /// Write a generated image under a fresh unique name.
    pub async fn store_image(&self, image: &GeneratedImage) -> Result<ArtifactRef, StorageError> {
        let name = format!(
            "image_{}.{}",
            Ulid::new().to_string().to_ascii_lowercase(),
            image.extension()
        );
        let path = self.to_path(&name)?;
        self.store
            .put(&path, object_store::PutPayload::from(image.bytes.clone()))
            .await?;

        tracing::debug!(artifact = %name, bytes = image.bytes.len(), "Stored artifact");
        Ok(ArtifactRef::new(name))
    }

    /// Read an artifact's bytes by name.
    pub async fn fetch(&self, name: &str) -> Result<Bytes, StorageError> {
        let path = self.to_path(name)?;
        match self.store.get(&path).await {
            Ok(res) => Ok(res.bytes().await?),
            Err(object_store::Error::NotFound { .. }) => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an artifact. Deleting a missing artifact is not an error.
    pub async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.to_path(name)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn to_path(&self, name: &str) -> Result<Path, StorageError> {
        validate_name(name)?;

        let joined = match self.prefix.as_deref() {
            Some(prefix) => {
                let prefix = prefix.trim_matches('/');
                if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{prefix}/{name}")
                }
            }
            None => name.to_string(),
        };

        Ok(Path::from(joined))
    }
}

/// Content type to serve an artifact with, by extension.
pub fn content_type(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "png" => "image/png",
        _ => "application/octet-stream",
    }
}

fn validate_name(name: &str) -> Result<(), StorageError> {
    let safe = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if safe {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

fn ensure_dir(root: &FsPath) -> Result<(), StorageError> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[tokio::test]
    async fn in_memory_round_trip() -> Result<(), StorageError> {
        let storage = ArtifactStorage::new(ArtifactStoreConfig::memory())?;
        let artifact = storage
            .store_image(&GeneratedImage::png(b"not-really-a-png".to_vec()))
            .await?;

        assert!(artifact.as_str().starts_with("image_"));
        assert!(artifact.as_str().ends_with(".png"));

        let got = storage.fetch(artifact.as_str()).await?;
        assert_eq!(got, Bytes::from_static(b"not-really-a-png"));
        Ok(())
    }

    #[tokio::test]
    async fn filesystem_writes_under_the_root() -> Result<(), StorageError> {
        let dir = tempfile::tempdir()?;
        let storage = ArtifactStorage::new(ArtifactStoreConfig::filesystem(dir.path()))?;
        assert_eq!(storage.kind(), StorageKind::Filesystem);

        let artifact = storage
            .store_image(&GeneratedImage::new(vec![0xff, 0xd8], "image/jpeg"))
            .await?;
        assert!(artifact.as_str().ends_with(".jpg"));
        assert!(dir.path().join(artifact.as_str()).exists());

        storage.delete(artifact.as_str()).await?;
        assert!(!dir.path().join(artifact.as_str()).exists());
        Ok(())
    }

    #[tokio::test]
    async fn missing_artifacts_are_reported_as_not_found() -> Result<(), StorageError> {
        let storage = ArtifactStorage::new(ArtifactStoreConfig::memory())?;
        let err = storage.fetch("image_missing.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));

        storage.delete("image_missing.png").await?;
        Ok(())
    }

    #[tokio::test]
    async fn unsafe_names_are_rejected() -> Result<(), StorageError> {
        let storage = ArtifactStorage::new(ArtifactStoreConfig::memory())?;
        for name in ["", "../etc/passwd", ".hidden", "a/b.png", "a b.png", "..\\x"] {
            let err = storage.fetch(name).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidName(_)), "{name}");
        }
        Ok(())
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type("image_1.png"), "image/png");
        assert_eq!(content_type("image_1.JPG"), "image/jpeg");
        assert_eq!(content_type("image_1"), "application/octet-stream");
    }
}
