//! Media Uploader (§4.C): streams a local file to the object bucket under a
//! deterministic name and returns a public URL, or `None` on any failure.

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::media::object_store::ObjectStore;
use crate::model::{MediaType, RecordId};
use crate::path::PathResolver;
use crate::retry;

/// Deterministic bucket/key/content-type for a post's media, per §4.C.
fn object_spec(media_type: MediaType, id: RecordId) -> (&'static str, String, &'static str) {
    match media_type {
        MediaType::Image => ("media", format!("{id}.jpg"), "image/jpeg"),
        MediaType::Video => ("reels", format!("{id}.mp4"), "video/mp4"),
    }
}

pub struct MediaUploader {
    path_resolver: PathResolver,
    object_store: Arc<dyn ObjectStore>,
    config: SyncConfig,
}

impl MediaUploader {
    pub fn new(
        path_resolver: PathResolver,
        object_store: Arc<dyn ObjectStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            path_resolver,
            object_store,
            config,
        }
    }

    /// Upload `local_uri`'s contents under `id`, retrying transient
    /// failures per §4.B. Returns `None` without any network I/O if the
    /// file does not exist (§4.C — "a nonexistent file causes an immediate
    /// None").
    pub async fn upload(
        &self,
        local_uri: &str,
        id: RecordId,
        media_type: MediaType,
    ) -> Option<String> {
        if !self.path_resolver.exists(local_uri) {
            tracing::warn!(uri = local_uri, %id, "media file missing, skipping upload");
            return None;
        }
        let path = self.path_resolver.full_path(local_uri);
        let (bucket, key, content_type) = object_spec(media_type, id);

        retry::execute(&self.config, "media-upload", || {
            let path = path.clone();
            let key = key.clone();
            async move {
                let bytes = tokio::fs::read(&path).await.map_err(|e| e.to_string())?;
                self.object_store
                    .put(bucket, &key, content_type, bytes)
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeObjectStore;

    fn uploader_with(dir: &std::path::Path, store: Arc<FakeObjectStore>) -> MediaUploader {
        MediaUploader::new(PathResolver::new(dir), store, SyncConfig::default())
    }

    #[tokio::test]
    async fn missing_file_returns_none_without_touching_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeObjectStore::new());
        let uploader = uploader_with(dir.path(), store.clone());

        let result = uploader
            .upload("missing.jpg", RecordId::new(), MediaType::Image)
            .await;

        assert!(result.is_none());
        assert!(store.get("media", "anything").is_none());
    }

    #[tokio::test]
    async fn image_upload_uses_media_bucket_and_jpg_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"imgdata").unwrap();
        let store = Arc::new(FakeObjectStore::new());
        let uploader = uploader_with(dir.path(), store.clone());
        let id = RecordId::new();

        let url = uploader.upload("a.jpg", id, MediaType::Image).await;

        assert!(url.is_some());
        assert_eq!(
            store.get("media", &format!("{id}.jpg")),
            Some(b"imgdata".to_vec())
        );
    }

    #[tokio::test]
    async fn video_upload_uses_reels_bucket_and_mp4_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("v.mov"), b"viddata").unwrap();
        let store = Arc::new(FakeObjectStore::new());
        let uploader = uploader_with(dir.path(), store.clone());
        let id = RecordId::new();

        let url = uploader.upload("v.mov", id, MediaType::Video).await;

        assert!(url.is_some());
        assert_eq!(
            store.get("reels", &format!("{id}.mp4")),
            Some(b"viddata".to_vec())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_retries_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"data").unwrap();
        let store = Arc::new(FakeObjectStore::new());
        store.fail_next_n(2);
        let uploader = uploader_with(dir.path(), store.clone());

        let url = uploader.upload("a.jpg", RecordId::new(), MediaType::Image).await;
        assert!(url.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_return_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"data").unwrap();
        let store = Arc::new(FakeObjectStore::new());
        store.fail_next_n(10);
        let uploader = uploader_with(dir.path(), store.clone());

        let url = uploader.upload("a.jpg", RecordId::new(), MediaType::Image).await;
        assert!(url.is_none());
    }
}
