//! Filesystem storage for uploaded images (logo, signature).
//!
//! Blobs are written as UUID-named files under a configured base directory.
//! Filenames come from typed `Uuid`s, never from client strings, so the
//! store cannot be steered outside its directory. The served `Content-Type`
//! is sniffed from the leading magic bytes.

use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ApiError;

/// Guess an image content type from magic bytes, defaulting to octet-stream.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(b"GIF8") {
        "image/gif"
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
    max_size: usize,
}

impl BlobStore {
    /// Open the store, creating the directory if missing.
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ApiError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ApiError::Internal(format!(
                "Failed to create upload directory '{}': {e}",
                base_path.display()
            ))
        })?;

        info!(path = %base_path.display(), "Blob store initialized");
        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub async fn store_blob(&self, data: &[u8]) -> Result<Uuid, ApiError> {
        if data.is_empty() {
            return Err(ApiError::BadRequest("Empty upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ApiError::BadRequest(format!(
                "Upload too large: {} bytes (max {})",
                data.len(),
                self.max_size
            )));
        }

        let id = Uuid::new_v4();
        fs::write(self.blob_path(id), data)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to write blob {id}: {e}")))?;

        debug!(id = %id, size = data.len(), "Stored blob");
        Ok(id)
    }

    pub async fn get_blob(&self, id: Uuid) -> Result<Vec<u8>, ApiError> {
        match fs::read(self.blob_path(id)).await {
            Ok(data) => {
                debug!(id = %id, size = data.len(), "Retrieved blob");
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ApiError::NotFound(format!("blob {id}")))
            }
            Err(e) => Err(ApiError::Internal(format!("Failed to read blob {id}: {e}"))),
        }
    }

    pub async fn delete_blob(&self, id: Uuid) -> Result<(), ApiError> {
        match fs::remove_file(self.blob_path(id)).await {
            Ok(()) => {
                debug!(id = %id, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ApiError::NotFound(format!("blob {id}")))
            }
            Err(e) => Err(ApiError::Internal(format!(
                "Failed to delete blob {id}: {e}"
            ))),
        }
    }

    // Uuid's Display is hex and dashes only, safe as a filename.
    fn blob_path(&self, id: Uuid) -> PathBuf {
        self.base_path.join(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (BlobStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024 * 1024)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn store_and_get() {
        let (store, _dir) = test_store().await;
        let data = b"\x89PNG\r\n\x1a\nrest-of-image";

        let id = store.store_blob(data).await.unwrap();
        let retrieved = store.get_blob(id).await.unwrap();
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn delete_then_missing() {
        let (store, _dir) = test_store().await;
        let id = store.store_blob(b"delete-me").await.unwrap();

        store.delete_blob(id).await.unwrap();
        assert!(matches!(
            store.get_blob(id).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn empty_upload_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store.store_blob(b"").await.is_err());
    }

    #[tokio::test]
    async fn oversized_upload_rejected() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 4).await.unwrap();
        assert!(store.store_blob(b"too large").await.is_err());
    }

    #[test]
    fn content_type_sniffing() {
        assert_eq!(sniff_content_type(b"\x89PNG\r\n"), "image/png");
        assert_eq!(sniff_content_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(
            sniff_content_type(b"RIFF\x00\x00\x00\x00WEBPVP8"),
            "image/webp"
        );
        assert_eq!(sniff_content_type(b"plain text"), "application/octet-stream");
    }
}
