//! Local-disk media store for post images.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use quill_core::ports::{MediaError, MediaStore, Upload};

const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

/// Local media store configuration.
#[derive(Debug, Clone)]
pub struct LocalMediaConfig {
    /// Directory uploads are written to.
    pub root: PathBuf,
    /// Largest accepted upload, in bytes.
    pub max_bytes: usize,
}

impl Default for LocalMediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("uploads"),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl LocalMediaConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
            max_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_bytes),
        }
    }
}

/// Writes uploads as `<unix-millis>-<uuid>.<ext>` under the configured root.
/// The file name is the reference handed back to callers.
pub struct LocalMediaStore {
    config: LocalMediaConfig,
}

impl LocalMediaStore {
    pub fn new(config: LocalMediaConfig) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn reference_for(file_name: &str) -> String {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(str::to_ascii_lowercase);

        let stem = format!("{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4().simple());
        match extension {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem,
        }
    }

    /// Resolve a reference to a path, refusing anything that could escape the root.
    fn path_for(&self, reference: &str) -> Result<PathBuf, MediaError> {
        let valid = !reference.is_empty()
            && reference
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !reference.starts_with('.');
        if !valid {
            return Err(MediaError::InvalidReference(reference.to_string()));
        }
        Ok(self.config.root.join(reference))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn store(&self, upload: Upload) -> Result<String, MediaError> {
        if upload.bytes.len() > self.config.max_bytes {
            return Err(MediaError::TooLarge {
                size: upload.bytes.len(),
                max: self.config.max_bytes,
            });
        }

        let content_type = upload.content_type.as_deref().unwrap_or("");
        if !ALLOWED_MIME_TYPES.contains(&content_type) {
            return Err(MediaError::UnsupportedType(content_type.to_string()));
        }

        let reference = Self::reference_for(&upload.file_name);
        let path = self.path_for(&reference)?;

        tokio::fs::create_dir_all(&self.config.root)
            .await
            .map_err(|e| MediaError::Io(e.to_string()))?;
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|e| MediaError::Io(e.to_string()))?;

        tracing::debug!(%reference, size = upload.bytes.len(), "Stored upload");
        Ok(reference)
    }

    async fn remove(&self, reference: &str) -> Result<(), MediaError> {
        let path = self.path_for(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MediaError::Io(e.to_string())),
        }
    }
}
