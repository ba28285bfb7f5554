//! `reqwest`-backed [`RemoteStore`] talking to a PostgREST-style HTTP+SQL
//! facade over the `posts`/`likes`/`comments` tables (§6.2).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RemoteError;
use crate::remote::traits::RemoteStore;
use crate::remote::types::{
    CommentUpsert, LikeUpsert, PostUpsert, RemoteComment, RemoteLike, RemotePost,
};

pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn upsert<T: Serialize + Sync>(&self, table: &str, rows: &[T]) -> Result<(), RemoteError> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), table);
        let response = self
            .client
            .post(&url)
            .header("Prefer", "resolution=merge-duplicates")
            .json(rows)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn fetch_since<T: for<'de> serde::Deserialize<'de>>(
        &self,
        table: &str,
        watermark_column: &str,
        watermark: DateTime<Utc>,
        order_column: &str,
        limit: u32,
    ) -> Result<Vec<T>, RemoteError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), table);
        let response = self
            .client
            .get(&url)
            .query(&[
                (watermark_column.to_string(), format!("gt.{}", watermark.to_rfc3339())),
                ("order".to_string(), format!("{order_column}.asc")),
                ("limit".to_string(), limit.to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json::<Vec<T>>().await?)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn upsert_posts(&self, rows: &[PostUpsert]) -> Result<(), RemoteError> {
        self.upsert("posts", rows).await
    }

    async fn upsert_likes(&self, rows: &[LikeUpsert]) -> Result<(), RemoteError> {
        self.upsert("likes", rows).await
    }

    async fn upsert_comments(&self, rows: &[CommentUpsert]) -> Result<(), RemoteError> {
        self.upsert("comments", rows).await
    }

    async fn fetch_posts_since(
        &self,
        watermark: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RemotePost>, RemoteError> {
        self.fetch_since("posts", "updated_at", watermark, "updated_at", limit)
            .await
    }

    async fn fetch_likes_since(
        &self,
        watermark: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RemoteLike>, RemoteError> {
        self.fetch_since("likes", "updated_at", watermark, "updated_at", limit)
            .await
    }

    async fn fetch_comments_since(
        &self,
        watermark: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RemoteComment>, RemoteError> {
        self.fetch_since("comments", "updated_at", watermark, "updated_at", limit)
            .await
    }
}
