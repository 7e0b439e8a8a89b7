//! Media storage port - receives upload bytes, hands back a stable reference.

use async_trait::async_trait;

/// Raw upload as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Blob store for post images. Only the returned reference is persisted.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist the upload and return its reference.
    async fn store(&self, upload: Upload) -> Result<String, MediaError>;

    /// Remove a previously stored blob.
    async fn remove(&self, reference: &str) -> Result<(), MediaError>;
}

/// Media storage errors.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("File too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("File type not allowed: {0}")]
    UnsupportedType(String),

    #[error("Invalid media reference: {0}")]
    InvalidReference(String),

    #[error("Storage I/O failed: {0}")]
    Io(String),
}
