//! Storage for uploaded gallery images.

use std::path::PathBuf;

use async_trait::async_trait;
use hostbook_core::error::CoreError;
use hostbook_core::media::ProcessedImage;
use hostbook_core::types::BookletId;
use uuid::Uuid;

/// URL prefix under which [`LocalMediaStore`] files are served.
pub const MEDIA_URL_PREFIX: &str = "/media";

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist `image` and return the URL guests load it from.
    async fn save(&self, booklet_id: BookletId, image: &ProcessedImage) -> Result<String, CoreError>;
}

/// Writes images to `<root>/<booklet_id>/<uuid>.<ext>`.
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save(&self, booklet_id: BookletId, image: &ProcessedImage) -> Result<String, CoreError> {
        let dir = self.root.join(booklet_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::Internal(format!("create media dir: {e}")))?;

        let file_name = format!("{}.{}", Uuid::new_v4(), image.extension());
        tokio::fs::write(dir.join(&file_name), &image.bytes)
            .await
            .map_err(|e| CoreError::Internal(format!("write media file: {e}")))?;

        tracing::debug!(
            %booklet_id,
            file_name = %file_name,
            bytes = image.bytes.len(),
            resized = image.resized,
            "Gallery image stored"
        );
        Ok(format!("{MEDIA_URL_PREFIX}/{booklet_id}/{file_name}"))
    }
}
