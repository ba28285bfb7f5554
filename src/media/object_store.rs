//! Object storage abstraction (§6.3): two buckets (`media` for images,
//! `reels` for videos), addressed by `<id>.<ext>`, `upsert = true` always.

use async_trait::async_trait;

use crate::error::RemoteError;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Put `bytes` under `bucket`/`key`, overwriting any prior object
    /// (upsert semantics — retries never fail on a partial prior upload).
    /// Returns the object's public URL on success.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, RemoteError>;
}

/// `reqwest`-backed object store for a bucket service exposing a simple
/// `PUT {base_url}/{bucket}/{key}` upload endpoint and deterministic public
/// URLs of the same shape (§6.3 — "a deterministic function of bucket and
/// key").
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url.trim_end_matches('/'), bucket, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, RemoteError> {
        let url = self.public_url(bucket, key);
        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RemoteError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(url)
    }
}

