//! `LocalStore` (§6.1/§3.4): the narrow storage interface the sync engine
//! depends on — a handful of purpose-built methods rather than a generic
//! query builder, each backed by a short synchronous transaction (§5).

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::model::{Comment, Like, Post, RecordId, SystemSettings};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub posts_deleted: usize,
    pub likes_deleted: usize,
    pub comments_deleted: usize,
}

pub trait LocalStore: Send + Sync {
    /// §7 / §4.H: every entry point checks this first and aborts silently.
    fn is_closed(&self) -> bool;

    // -- reads used to build the push cycle's work list (§4.D) --
    fn posts_unsynced(&self) -> Result<Vec<Post>, StoreError>;
    fn likes_unsynced(&self) -> Result<Vec<Like>, StoreError>;
    fn comments_unsynced(&self) -> Result<Vec<Comment>, StoreError>;

    fn get_post(&self, id: RecordId) -> Result<Option<Post>, StoreError>;
    fn get_like(&self, id: RecordId) -> Result<Option<Like>, StoreError>;
    fn get_comment(&self, id: RecordId) -> Result<Option<Comment>, StoreError>;

    /// Invariant 6: find the currently-active like for a (post, user) pair.
    /// Exposed for the UI collaborator to render "liked" state without
    /// scanning every like locally.
    fn active_like_for(
        &self,
        post_id: RecordId,
        user_email: &str,
    ) -> Result<Option<Like>, StoreError>;

    // -- authoring path (UI collaborator surface, §3.3) --
    fn create_post(&self, post: Post) -> Result<(), StoreError>;
    fn create_like(&self, like: Like) -> Result<(), StoreError>;
    fn create_comment(&self, comment: Comment) -> Result<(), StoreError>;
    fn toggle_like(&self, id: RecordId, now: DateTime<Utc>) -> Result<(), StoreError>;
    /// The "like a post" entry point proper (invariant 6, §4.D.2's
    /// resurrect path, glossary "Resurrect"): if a tombstoned row already
    /// exists for this `(post_id, user_email)` pair, clear its
    /// `deleted_at` instead of minting a second row; if an active row
    /// exists, this is a no-op; otherwise a fresh row is created. Always
    /// leaves at most one row for the pair, active or not.
    fn like_post(
        &self,
        post_id: RecordId,
        user_email: &str,
        now: DateTime<Utc>,
    ) -> Result<RecordId, StoreError>;
    fn soft_delete_post(&self, id: RecordId, now: DateTime<Utc>) -> Result<(), StoreError>;
    fn soft_delete_comment(&self, id: RecordId, now: DateTime<Utc>) -> Result<(), StoreError>;

    // -- push-side single-record transactions (§4.D.1, §4.D.2) --
    fn set_post_remote_url(&self, id: RecordId, remote_url: &str) -> Result<(), StoreError>;
    fn mark_post_synced(&self, id: RecordId) -> Result<(), StoreError>;
    fn mark_likes_synced(&self, ids: &[RecordId]) -> Result<(), StoreError>;
    fn mark_comments_synced(&self, ids: &[RecordId]) -> Result<(), StoreError>;

    // -- pull-side batched merges, one local transaction per call (§4.E) --
    /// Applies already-merged post states and advances the watermark, all
    /// in one transaction (§4.E step 4).
    fn apply_pull_posts(
        &self,
        posts: &[Post],
        new_watermark: DateTime<Utc>,
    ) -> Result<usize, StoreError>;
    fn apply_pull_likes(&self, likes: &[Like]) -> Result<usize, StoreError>;
    fn apply_pull_comments(&self, comments: &[Comment]) -> Result<usize, StoreError>;

    fn settings(&self) -> Result<SystemSettings, StoreError>;

    // -- pruner (§4.F) --
    fn prune(
        &self,
        retention: chrono::Duration,
        max_active_posts: usize,
        now: DateTime<Utc>,
    ) -> Result<PruneStats, StoreError>;

    // -- whole-table reads, mostly for tests and diagnostics --
    fn all_posts(&self) -> Result<Vec<Post>, StoreError>;
    fn all_likes(&self) -> Result<Vec<Like>, StoreError>;
    fn all_comments(&self) -> Result<Vec<Comment>, StoreError>;
}
