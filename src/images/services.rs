use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::StorageClient;

/// A file taken off a multipart request.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

impl UploadItem {
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub key: String,
    pub url: String,
}

/// Writes the file under `folder/` with a fresh name.
///
/// Nothing ties the write to the database row that will reference the URL;
/// callers undo it with [`discard_image`] when their own write fails.
pub async fn store_image(
    storage: &dyn StorageClient,
    folder: &str,
    item: UploadItem,
) -> anyhow::Result<StoredImage> {
    let ext = ext_from_mime(&item.content_type).unwrap_or("bin");
    let key = format!("{}/{}.{}", folder, Uuid::new_v4(), ext);
    storage
        .put_object(&key, item.body, &item.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    info!(%key, "image stored");
    let url = storage.public_url(&key);
    Ok(StoredImage { key, url })
}

/// Best-effort removal of a file that never got referenced.
pub async fn discard_image(storage: &dyn StorageClient, image: &StoredImage) {
    if let Err(e) = storage.delete_object(&image.key).await {
        warn!(error = %e, key = %image.key, "orphaned image left in storage");
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod image_tests {
    use super::*;
    use crate::storage::LocalStorage;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn store_image_writes_file_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/images");
        let item = UploadItem {
            body: Bytes::from_static(b"\x89PNG"),
            content_type: "image/png".into(),
        };

        let stored = store_image(&storage, "profiles", item).await.unwrap();
        assert!(stored.key.starts_with("profiles/"));
        assert_eq!(stored.url, format!("/images/{}", stored.key));
        assert!(stored.url.ends_with(".png"));
        assert!(dir.path().join(&stored.key).exists());

        discard_image(&storage, &stored).await;
        assert!(!dir.path().join(&stored.key).exists());
    }

    #[tokio::test]
    async fn unknown_mime_gets_bin_extension() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/images");
        let item = UploadItem {
            body: Bytes::from_static(b"raw"),
            content_type: "application/octet-stream".into(),
        };
        let stored = store_image(&storage, "meals", item).await.unwrap();
        assert!(stored.key.ends_with(".bin"));
    }
}
