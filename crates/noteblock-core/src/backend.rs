//! Contracts with the storage collaborator the editor persists through.

use crate::document::Document;
use crate::error::{AssetError, BackendError};
use async_trait::async_trait;

#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Loads one document by identifier.
    async fn fetch(&self, id: &str) -> Result<Document, BackendError>;

    /// Writes title, blocks, preferences and decoration for `document.id`,
    /// creating the row when it does not exist yet.
    async fn upsert(&self, document: &Document) -> Result<(), BackendError>;
}

#[async_trait]
pub trait AssetUploader: Send + Sync {
    /// Stores an image payload and returns a URL an image block can point at.
    async fn upload_image(
        &self,
        filename: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<String, AssetError>;
}
