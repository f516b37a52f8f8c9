//! services/api/src/adapters/images.rs
//!
//! Stores uploaded images on local disk under a random name and serves them
//! from a configured public base URL.

use async_trait::async_trait;
use cookstack_core::ports::{ImageStore, ImageUpload, PortError, PortResult};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

pub struct DiskImageStore {
    dir: PathBuf,
    base_url: String,
}

impl DiskImageStore {
    pub fn new(dir: PathBuf, base_url: String) -> Self {
        Self {
            dir,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// File extension for an accepted image content type.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

#[async_trait]
impl ImageStore for DiskImageStore {
    async fn upload(&self, file: ImageUpload) -> PortResult<String> {
        let extension = image_extension(&file.content_type).ok_or_else(|| {
            PortError::Unexpected(format!("unsupported content type {}", file.content_type))
        })?;
        let name = format!("{}.{}", Uuid::new_v4(), extension);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        tokio::fs::write(self.dir.join(&name), &file.bytes)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        info!(original = %file.file_name, stored = %name, bytes = file.bytes.len(), "Stored image");
        Ok(format!("{}/{}", self.base_url, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_writes_the_file_and_returns_its_url() {
        let dir = std::env::temp_dir().join(format!("cookstack-images-{}", Uuid::new_v4()));
        let store = DiskImageStore::new(dir.clone(), "http://cdn.test/images/".into());

        let url = store
            .upload(ImageUpload {
                file_name: "tarte.png".into(),
                content_type: "image/png".into(),
                bytes: vec![1, 2, 3],
            })
            .await
            .unwrap();

        assert!(url.starts_with("http://cdn.test/images/"));
        assert!(url.ends_with(".png"));
        let name = url.rsplit('/').next().unwrap();
        assert_eq!(tokio::fs::read(dir.join(name)).await.unwrap(), vec![1, 2, 3]);
        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[test]
    fn only_images_are_accepted() {
        assert_eq!(image_extension("image/jpeg"), Some("jpg"));
        assert_eq!(image_extension("application/pdf"), None);
    }
}
