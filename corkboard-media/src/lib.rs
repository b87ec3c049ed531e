//! Moves uploaded images to a remote object store and hands back their URLs.

pub mod cloudinary;

use async_trait::async_trait;
use bytes::Bytes;
use std::{fmt::Debug, sync::Arc};
use thiserror::Error;
use tracing::debug;

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Logical folder an upload is filed under in the remote store.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum MediaFolder {
    PostImages,
    ProfilePictures,
}

impl MediaFolder {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::PostImages => "linkedin_clone_posts",
            Self::ProfilePictures => "linkedin_clone_profiles",
        }
    }

    /// Only post images are checked for an `image/` content type.
    #[must_use]
    pub fn requires_image(self) -> bool {
        matches!(self, Self::PostImages)
    }
}

/// A file received from a client, held in memory.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Upload {
    pub bytes: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Unsupported media type: {0:?}")]
    UnsupportedMediaType(String),
    #[error("Upload to the media store failed: {0}")]
    UploadFailed(#[source] StoreError),
}

/// A remote object store.
#[async_trait]
pub trait MediaStore: Debug + Send + Sync {
    /// Stores `upload` under `folder` and returns its public `https` URL.
    /// Either the whole upload is stored or the call fails.
    async fn store(&self, upload: Upload, folder: MediaFolder) -> Result<String, StoreError>;
}

#[derive(Clone, Debug)]
pub struct MediaBridge {
    store: Arc<dyn MediaStore>,
}

impl MediaBridge {
    #[must_use]
    pub fn new(store: Arc<dyn MediaStore>) -> Self {
        Self { store }
    }

    pub async fn upload(&self, upload: Upload, folder: MediaFolder) -> Result<String, MediaError> {
        if folder.requires_image() && !upload.content_type.starts_with("image/") {
            return Err(MediaError::UnsupportedMediaType(upload.content_type));
        }

        let size = upload.bytes.len();
        let url = self
            .store
            .store(upload, folder)
            .await
            .map_err(MediaError::UploadFailed)?;

        debug!(folder = folder.name(), size, %url, "Stored upload");
        Ok(url)
    }
}
