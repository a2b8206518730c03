//! Storage seam for user-supplied post images.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid media path `{0}`")]
    InvalidPath(String),
    #[error("uploaded file is empty")]
    Empty,
    #[error("media storage failed: {0}")]
    Storage(String),
}

/// An image as received from a form, not yet validated or stored.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub data: Bytes,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist `data` under `prefix`, returning the path relative to the media root.
    async fn save(&self, prefix: &str, file_name: &str, data: Bytes)
    -> Result<String, MediaError>;

    /// Remove a stored file. Missing files are not an error.
    async fn remove(&self, stored_path: &str) -> Result<(), MediaError>;
}
