//! `RemoteStore` (§6.2): the HTTP+SQL-like upsert/read surface the push and
//! pull pipelines depend on. All writes are upserts — re-sending a record is
//! always safe (invariant 1).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RemoteError;
use crate::remote::types::{
    CommentUpsert, LikeUpsert, PostUpsert, RemoteComment, RemoteLike, RemotePost,
};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn upsert_posts(&self, rows: &[PostUpsert]) -> Result<(), RemoteError>;
    async fn upsert_likes(&self, rows: &[LikeUpsert]) -> Result<(), RemoteError>;
    async fn upsert_comments(&self, rows: &[CommentUpsert]) -> Result<(), RemoteError>;

    async fn fetch_posts_since(
        &self,
        watermark: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RemotePost>, RemoteError>;
    async fn fetch_likes_since(
        &self,
        watermark: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RemoteLike>, RemoteError>;
    async fn fetch_comments_since(
        &self,
        watermark: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RemoteComment>, RemoteError>;
}
