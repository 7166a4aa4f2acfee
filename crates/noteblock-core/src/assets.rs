use crate::backend::AssetUploader;
use crate::db::{AssetRecord, Database};
use crate::error::AssetError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const ASSET_URL_SCHEME: &str = "asset://";

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/svg+xml", "svg"),
];

/// Content-addressed image storage backing image blocks and banners.
pub struct AssetStore {
    db: Arc<Database>,
    root: PathBuf,
}

impl AssetStore {
    pub fn new(db: Arc<Database>, root: impl AsRef<Path>) -> Self {
        Self {
            db,
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn store_bytes(
        &self,
        filename: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<AssetRecord, AssetError> {
        if bytes.is_empty() {
            return Err(AssetError::Empty);
        }
        let extension = image_extension(mime_type)
            .ok_or_else(|| AssetError::UnsupportedType(mime_type.to_string()))?;

        let hash = hash_bytes(bytes);
        let relative_path = PathBuf::from("assets").join(format!("{hash}.{extension}"));
        let full_path = self.root.join(&relative_path);

        if !full_path.exists() {
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&full_path, bytes)?;
        }

        let record = self.db.upsert_asset(
            &hash,
            relative_path.to_string_lossy().as_ref(),
            mime_type,
            bytes.len() as i64,
            Some(filename),
        )?;
        Ok(record)
    }

    /// Resolves an `asset://` URL back to a file under the store root.
    pub fn resolve_url(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(ASSET_URL_SCHEME)?;
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return None;
        }
        let path = self.root.join("assets").join(name);
        path.exists().then_some(path)
    }
}

pub fn asset_url(record: &AssetRecord) -> String {
    let name = Path::new(&record.path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| record.hash.clone());
    format!("{ASSET_URL_SCHEME}{name}")
}

fn image_extension(mime_type: &str) -> Option<&'static str> {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(mime, _)| *mime == mime_type)
        .map(|(_, ext)| *ext)
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex::encode(digest)
}

#[async_trait]
impl AssetUploader for AssetStore {
    async fn upload_image(
        &self,
        filename: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<String, AssetError> {
        let record = self.store_bytes(filename, mime_type, bytes)?;
        let url = asset_url(&record);
        info!(%url, size = record.size, "image uploaded");
        Ok(url)
    }
}
