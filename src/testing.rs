//! In-memory test doubles for [`ObjectStore`] and [`RemoteStore`].
//!
//! Gated behind the `test-support` feature (auto-enabled for this crate's
//! own unit/integration tests via the dev-dependency self-loop in
//! `Cargo.toml`) rather than plain `#[cfg(test)]`, since integration tests
//! under `tests/` compile against this crate as an external dependency and
//! would otherwise have no way to reach them.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::RemoteError;
use crate::media::object_store::ObjectStore;
use crate::model::RecordId;
use crate::remote::traits::RemoteStore;
use crate::remote::types::{
    CommentUpsert, LikeUpsert, PostUpsert, RemoteComment, RemoteLike, RemotePost,
};

/// Records puts, can be told to fail the next N calls to exercise
/// retry/exhaustion paths (§4.B, §4.C).
#[derive(Default)]
pub struct FakeObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    fail_next: Mutex<u32>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_n(&self, n: u32) {
        *self.fail_next.lock() = n;
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        _content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, RemoteError> {
        {
            let mut fail_next = self.fail_next.lock();
            if *fail_next > 0 {
                *fail_next -= 1;
                return Err(RemoteError::Status {
                    status: 503,
                    body: "injected failure".into(),
                });
            }
        }
        self.objects
            .lock()
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(format!("https://fake.local/{bucket}/{key}"))
    }
}

#[derive(Default)]
struct RemoteTables {
    posts: HashMap<RecordId, RemotePost>,
    likes: HashMap<RecordId, RemoteLike>,
    comments: HashMap<RecordId, RemoteComment>,
    fail_next: u32,
}

/// In-process stand-in for the server side of §4.D/§4.E: upserts land in
/// plain maps, `updated_at` is stamped from a caller-controlled clock so
/// pull-watermark tests can move time without sleeping.
pub struct FakeRemoteStore {
    tables: Mutex<RemoteTables>,
}

impl FakeRemoteStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(RemoteTables::default()),
        }
    }

    pub fn fail_next_n(&self, n: u32) {
        self.tables.lock().fail_next = n;
    }

    fn check_fail(&self) -> Result<(), RemoteError> {
        let mut tables = self.tables.lock();
        if tables.fail_next > 0 {
            tables.fail_next -= 1;
            return Err(RemoteError::Status {
                status: 503,
                body: "injected failure".into(),
            });
        }
        Ok(())
    }

    pub fn post_count(&self) -> usize {
        self.tables.lock().posts.len()
    }

    /// Seed a post directly on the "server" side, as if another client had
    /// already pushed it, stamped with the given `updated_at` (used to
    /// drive pull-since-watermark scenarios).
    pub fn seed_post(&self, post: RemotePost) {
        self.tables.lock().posts.insert(post.id, post);
    }

    pub fn seed_like(&self, like: RemoteLike) {
        self.tables.lock().likes.insert(like.id, like);
    }

    pub fn seed_comment(&self, comment: RemoteComment) {
        self.tables.lock().comments.insert(comment.id, comment);
    }
}

impl Default for FakeRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for FakeRemoteStore {
    async fn upsert_posts(&self, rows: &[PostUpsert]) -> Result<(), RemoteError> {
        self.check_fail()?;
        let mut tables = self.tables.lock();
        for row in rows {
            let updated_at = tables
                .posts
                .get(&row.id)
                .map(|p| p.updated_at)
                .unwrap_or(row.timestamp);
            tables.posts.insert(
                row.id,
                RemotePost {
                    id: row.id,
                    text: row.text.clone(),
                    image_url: row.image_url.clone(),
                    video_url: row.video_url.clone(),
                    media_type: Some(row.media_type),
                    thumbnail_url: row.thumbnail_url.clone(),
                    timestamp: row.timestamp,
                    user_email: Some(row.user_email.clone()),
                    deleted_at: row.deleted_at,
                    updated_at: updated_at.max(row.timestamp),
                },
            );
        }
        Ok(())
    }

    async fn upsert_likes(&self, rows: &[LikeUpsert]) -> Result<(), RemoteError> {
        self.check_fail()?;
        let mut tables = self.tables.lock();
        for row in rows {
            tables.likes.insert(
                row.id,
                RemoteLike {
                    id: row.id,
                    post_id: row.post_id,
                    user_email: row.user_email.clone(),
                    deleted_at: row.deleted_at,
                    updated_at: Utc::now(),
                },
            );
        }
        Ok(())
    }

    async fn upsert_comments(&self, rows: &[CommentUpsert]) -> Result<(), RemoteError> {
        self.check_fail()?;
        let mut tables = self.tables.lock();
        for row in rows {
            tables.comments.insert(
                row.id,
                RemoteComment {
                    id: row.id,
                    post_id: row.post_id,
                    user_email: row.user_email.clone(),
                    text: row.text.clone(),
                    created_at: row.created_at,
                    deleted_at: row.deleted_at,
                    updated_at: Utc::now(),
                },
            );
        }
        Ok(())
    }

    async fn fetch_posts_since(
        &self,
        watermark: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RemotePost>, RemoteError> {
        self.check_fail()?;
        let tables = self.tables.lock();
        let mut rows: Vec<RemotePost> = tables
            .posts
            .values()
            .filter(|p| p.updated_at > watermark)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.updated_at);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn fetch_likes_since(
        &self,
        watermark: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RemoteLike>, RemoteError> {
        self.check_fail()?;
        let tables = self.tables.lock();
        let mut rows: Vec<RemoteLike> = tables
            .likes
            .values()
            .filter(|l| l.updated_at > watermark)
            .cloned()
            .collect();
        rows.sort_by_key(|l| l.updated_at);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn fetch_comments_since(
        &self,
        watermark: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RemoteComment>, RemoteError> {
        self.check_fail()?;
        let tables = self.tables.lock();
        let mut rows: Vec<RemoteComment> = tables
            .comments
            .values()
            .filter(|c| c.updated_at > watermark)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.updated_at);
        rows.truncate(limit as usize);
        Ok(rows)
    }
}
