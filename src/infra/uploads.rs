//! Filesystem storage for post images.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::application::media::{MediaError, MediaStore};

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("stored path is not a file")]
    NotAFile,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
}

impl From<UploadStorageError> for MediaError {
    fn from(err: UploadStorageError) -> Self {
        match err {
            UploadStorageError::InvalidPath | UploadStorageError::NotAFile => {
                MediaError::InvalidPath(err.to_string())
            }
            UploadStorageError::EmptyPayload => MediaError::Empty,
            UploadStorageError::Io(io) => MediaError::Storage(io.to_string()),
        }
    }
}

/// Media directory on local disk. Stored paths are relative to `root` and
/// double as the URL suffix under `/media/`.
#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub async fn store(
        &self,
        prefix: &str,
        original_name: &str,
        data: Bytes,
    ) -> Result<String, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        let stored_path = build_stored_path(prefix, original_name);
        let absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        if let Err(err) = file.write_all(&data).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(err.into());
        }
        file.flush().await?;

        Ok(stored_path)
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        if !fs::metadata(&absolute).await?.is_file() {
            return Err(UploadStorageError::NotAFile);
        }
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for UploadStorage {
    async fn save(
        &self,
        prefix: &str,
        file_name: &str,
        data: Bytes,
    ) -> Result<String, MediaError> {
        Ok(self.store(prefix, file_name, data).await?)
    }

    async fn remove(&self, stored_path: &str) -> Result<(), MediaError> {
        Ok(self.delete(stored_path).await?)
    }
}

fn build_stored_path(prefix: &str, original_name: &str) -> String {
    let identifier = Uuid::new_v4().simple();
    let filename = sanitize_filename(original_name);
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{identifier}-{filename}")
    } else {
        format!("{prefix}/{identifier}-{filename}")
    }
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("upload");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "upload".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}
