//! In-memory [`LocalStore`]: a `parking_lot::Mutex`-guarded set of HashMaps.
//! There is no separate inner backend to flush to, since this variant's
//! whole job is to BE the backend for tests and for embeddings with no
//! durability requirement, e.g. a scratch profile.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::model::{Comment, Like, Post, RecordId, SystemSettings};
use crate::store::traits::{LocalStore, PruneStats};

struct Tables {
    posts: HashMap<RecordId, Post>,
    likes: HashMap<RecordId, Like>,
    comments: HashMap<RecordId, Comment>,
    settings: Option<SystemSettings>,
    closed: bool,
}

pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                posts: HashMap::new(),
                likes: HashMap::new(),
                comments: HashMap::new(),
                settings: None,
                closed: false,
            }),
        }
    }

    /// Test/debug hook: simulate the store being closed mid-cycle (§4.H).
    pub fn close(&self) {
        self.tables.lock().closed = true;
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for InMemoryStore {
    fn is_closed(&self) -> bool {
        self.tables.lock().closed
    }

    fn posts_unsynced(&self) -> Result<Vec<Post>, StoreError> {
        Ok(self
            .tables
            .lock()
            .posts
            .values()
            .filter(|p| !p.is_synced)
            .cloned()
            .collect())
    }

    fn likes_unsynced(&self) -> Result<Vec<Like>, StoreError> {
        Ok(self
            .tables
            .lock()
            .likes
            .values()
            .filter(|l| !l.is_synced)
            .cloned()
            .collect())
    }

    fn comments_unsynced(&self) -> Result<Vec<Comment>, StoreError> {
        Ok(self
            .tables
            .lock()
            .comments
            .values()
            .filter(|c| !c.is_synced)
            .cloned()
            .collect())
    }

    fn get_post(&self, id: RecordId) -> Result<Option<Post>, StoreError> {
        Ok(self.tables.lock().posts.get(&id).cloned())
    }

    fn get_like(&self, id: RecordId) -> Result<Option<Like>, StoreError> {
        Ok(self.tables.lock().likes.get(&id).cloned())
    }

    fn get_comment(&self, id: RecordId) -> Result<Option<Comment>, StoreError> {
        Ok(self.tables.lock().comments.get(&id).cloned())
    }

    fn active_like_for(
        &self,
        post_id: RecordId,
        user_email: &str,
    ) -> Result<Option<Like>, StoreError> {
        Ok(self
            .tables
            .lock()
            .likes
            .values()
            .find(|l| l.post_id == post_id && l.user_email == user_email && l.deleted_at.is_none())
            .cloned())
    }

    fn create_post(&self, post: Post) -> Result<(), StoreError> {
        self.tables.lock().posts.insert(post.id, post);
        Ok(())
    }

    fn create_like(&self, like: Like) -> Result<(), StoreError> {
        self.tables.lock().likes.insert(like.id, like);
        Ok(())
    }

    fn create_comment(&self, comment: Comment) -> Result<(), StoreError> {
        self.tables.lock().comments.insert(comment.id, comment);
        Ok(())
    }

    fn toggle_like(&self, id: RecordId, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let like = tables
            .likes
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        crate::model::toggle_like(like, now);
        Ok(())
    }

    fn like_post(
        &self,
        post_id: RecordId,
        user_email: &str,
        now: DateTime<Utc>,
    ) -> Result<RecordId, StoreError> {
        let mut tables = self.tables.lock();
        if let Some(existing) = tables
            .likes
            .values_mut()
            .find(|l| l.post_id == post_id && l.user_email == user_email)
        {
            if existing.deleted_at.is_some() {
                crate::model::toggle_like(existing, now);
            }
            return Ok(existing.id);
        }
        let id = RecordId::new();
        tables.likes.insert(
            id,
            Like {
                id,
                post_id,
                user_email: user_email.to_string(),
                is_synced: false,
                deleted_at: None,
            },
        );
        Ok(id)
    }

    fn soft_delete_post(&self, id: RecordId, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let post = tables
            .posts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        post.deleted_at = Some(now);
        post.is_synced = false;
        Ok(())
    }

    fn soft_delete_comment(&self, id: RecordId, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let comment = tables
            .comments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        comment.deleted_at = Some(now);
        comment.is_synced = false;
        Ok(())
    }

    fn set_post_remote_url(&self, id: RecordId, remote_url: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let post = tables
            .posts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        post.remote_url = Some(remote_url.to_string());
        Ok(())
    }

    fn mark_post_synced(&self, id: RecordId) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let post = tables
            .posts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        post.is_synced = true;
        post.synced_text = Some(post.text.clone());
        post.synced_remote_url = post.remote_url.clone();
        Ok(())
    }

    fn mark_likes_synced(&self, ids: &[RecordId]) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        for id in ids {
            if let Some(like) = tables.likes.get_mut(id) {
                like.is_synced = true;
            }
        }
        Ok(())
    }

    fn mark_comments_synced(&self, ids: &[RecordId]) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        for id in ids {
            if let Some(comment) = tables.comments.get_mut(id) {
                comment.is_synced = true;
                comment.synced_text = Some(comment.text.clone());
            }
        }
        Ok(())
    }

    fn apply_pull_posts(
        &self,
        posts: &[Post],
        new_watermark: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut tables = self.tables.lock();
        for post in posts {
            tables.posts.insert(post.id, post.clone());
        }
        let settings = tables.settings.get_or_insert_with(|| SystemSettings::fresh(RecordId::new()));
        if new_watermark > settings.last_sync_time {
            settings.last_sync_time = new_watermark;
        }
        Ok(posts.len())
    }

    fn apply_pull_likes(&self, likes: &[Like]) -> Result<usize, StoreError> {
        let mut tables = self.tables.lock();
        for like in likes {
            tables.likes.insert(like.id, like.clone());
        }
        Ok(likes.len())
    }

    fn apply_pull_comments(&self, comments: &[Comment]) -> Result<usize, StoreError> {
        let mut tables = self.tables.lock();
        for comment in comments {
            tables.comments.insert(comment.id, comment.clone());
        }
        Ok(comments.len())
    }

    fn settings(&self) -> Result<SystemSettings, StoreError> {
        let mut tables = self.tables.lock();
        if tables.settings.is_none() {
            tables.settings = Some(SystemSettings::fresh(RecordId::new()));
        }
        Ok(tables.settings.clone().unwrap())
    }

    fn prune(
        &self,
        retention: chrono::Duration,
        max_active_posts: usize,
        now: DateTime<Utc>,
    ) -> Result<PruneStats, StoreError> {
        let mut tables = self.tables.lock();
        let cutoff = now - retention;
        let mut stats = PruneStats::default();

        // 1. Tombstone GC.
        let dead_posts: Vec<RecordId> = tables
            .posts
            .values()
            .filter(|p| p.is_synced && p.deleted_at.is_some_and(|d| d < cutoff))
            .map(|p| p.id)
            .collect();
        for id in &dead_posts {
            tables.posts.remove(id);
        }
        stats.posts_deleted += dead_posts.len();

        let dead_likes: Vec<RecordId> = tables
            .likes
            .values()
            .filter(|l| l.is_synced && l.deleted_at.is_some_and(|d| d < cutoff))
            .map(|l| l.id)
            .collect();
        for id in &dead_likes {
            tables.likes.remove(id);
        }
        stats.likes_deleted += dead_likes.len();

        let dead_comments: Vec<RecordId> = tables
            .comments
            .values()
            .filter(|c| c.is_synced && c.deleted_at.is_some_and(|d| d < cutoff))
            .map(|c| c.id)
            .collect();
        for id in &dead_comments {
            tables.comments.remove(id);
        }
        stats.comments_deleted += dead_comments.len();

        // 2. Size cap: oldest-first among active, synced posts.
        let mut active: Vec<(RecordId, DateTime<Utc>)> = tables
            .posts
            .values()
            .filter(|p| p.deleted_at.is_none() && p.is_synced)
            .map(|p| (p.id, p.timestamp))
            .collect();
        if active.len() > max_active_posts {
            active.sort_by_key(|(_, ts)| *ts);
            let overflow = active.len() - max_active_posts;
            for (id, _) in active.into_iter().take(overflow) {
                tables.posts.remove(&id);
                stats.posts_deleted += 1;
            }
        }

        // 3. Orphan sweep: likes/comments whose post no longer exists.
        let existing_posts: std::collections::HashSet<RecordId> =
            tables.posts.keys().copied().collect();
        let orphan_likes: Vec<RecordId> = tables
            .likes
            .values()
            .filter(|l| !existing_posts.contains(&l.post_id))
            .map(|l| l.id)
            .collect();
        for id in &orphan_likes {
            tables.likes.remove(id);
        }
        stats.likes_deleted += orphan_likes.len();

        let orphan_comments: Vec<RecordId> = tables
            .comments
            .values()
            .filter(|c| !existing_posts.contains(&c.post_id))
            .map(|c| c.id)
            .collect();
        for id in &orphan_comments {
            tables.comments.remove(id);
        }
        stats.comments_deleted += orphan_comments.len();

        Ok(stats)
    }

    fn all_posts(&self) -> Result<Vec<Post>, StoreError> {
        Ok(self.tables.lock().posts.values().cloned().collect())
    }

    fn all_likes(&self) -> Result<Vec<Like>, StoreError> {
        Ok(self.tables.lock().likes.values().cloned().collect())
    }

    fn all_comments(&self) -> Result<Vec<Comment>, StoreError> {
        Ok(self.tables.lock().comments.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaType;

    fn sample_post(now: DateTime<Utc>) -> Post {
        Post {
            id: RecordId::new(),
            text: "hi".into(),
            timestamp: now,
            media_type: MediaType::Image,
            local_uri: None,
            remote_url: None,
            thumbnail_url: None,
            user_email: "a@example.com".into(),
            is_synced: false,
            deleted_at: None,
            synced_text: None,
            synced_remote_url: None,
        }
    }

    #[test]
    fn fresh_settings_start_at_epoch() {
        let store = InMemoryStore::new();
        let settings = store.settings().unwrap();
        assert_eq!(settings.last_sync_time, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn prune_respects_retention_cap_and_orphans() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        // 600 active synced posts spread across a year.
        for i in 0..600 {
            let mut p = sample_post(now - chrono::Duration::days(365 - i));
            p.is_synced = true;
            store.create_post(p).unwrap();
        }

        // 5 tombstoned posts 40 days old.
        let mut tombstoned_ids = vec![];
        for _ in 0..5 {
            let mut p = sample_post(now);
            p.is_synced = true;
            p.deleted_at = Some(now - chrono::Duration::days(40));
            tombstoned_ids.push(p.id);
            store.create_post(p).unwrap();
        }

        let stats = store
            .prune(chrono::Duration::days(30), 500, now)
            .unwrap();

        assert_eq!(stats.posts_deleted, 105); // 5 tombstoned + 100 oldest active
        assert_eq!(store.all_posts().unwrap().len(), 500);
        for id in tombstoned_ids {
            assert!(store.get_post(id).unwrap().is_none());
        }
    }

    #[test]
    fn like_post_creates_a_new_row_when_none_exists() {
        let store = InMemoryStore::new();
        let post_id = RecordId::new();
        let id = store.like_post(post_id, "a@example.com", Utc::now()).unwrap();
        let like = store.get_like(id).unwrap().unwrap();
        assert!(like.deleted_at.is_none());
        assert!(!like.is_synced);
    }

    #[test]
    fn like_post_is_a_noop_when_already_active() {
        let store = InMemoryStore::new();
        let post_id = RecordId::new();
        let first = store.like_post(post_id, "a@example.com", Utc::now()).unwrap();
        let second = store.like_post(post_id, "a@example.com", Utc::now()).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.all_likes().unwrap().len(), 1);
    }

    #[test]
    fn like_post_resurrects_a_tombstoned_row_instead_of_duplicating() {
        let store = InMemoryStore::new();
        let post_id = RecordId::new();
        let id = store.like_post(post_id, "a@example.com", Utc::now()).unwrap();
        store.toggle_like(id, Utc::now()).unwrap();
        assert!(store.get_like(id).unwrap().unwrap().deleted_at.is_some());

        let again = store.like_post(post_id, "a@example.com", Utc::now()).unwrap();
        assert_eq!(again, id);
        assert!(store.get_like(id).unwrap().unwrap().deleted_at.is_none());
        assert_eq!(store.all_likes().unwrap().len(), 1);
    }

    #[test]
    fn prune_removes_orphaned_children() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let orphan_post_id = RecordId::new();

        let like = Like {
            id: RecordId::new(),
            post_id: orphan_post_id,
            user_email: "a@example.com".into(),
            is_synced: true,
            deleted_at: None,
        };
        store.create_like(like.clone()).unwrap();

        let stats = store.prune(chrono::Duration::days(30), 500, now).unwrap();
        assert_eq!(stats.likes_deleted, 1);
        assert!(store.get_like(like.id).unwrap().is_none());
    }

    #[test]
    fn active_like_for_ignores_tombstoned_rows_and_other_users() {
        let store = InMemoryStore::new();
        let post_id = RecordId::new();
        let id = store.like_post(post_id, "a@example.com", Utc::now()).unwrap();

        assert_eq!(
            store.active_like_for(post_id, "a@example.com").unwrap().map(|l| l.id),
            Some(id)
        );
        assert!(store.active_like_for(post_id, "b@example.com").unwrap().is_none());

        store.toggle_like(id, Utc::now()).unwrap();
        assert!(store.active_like_for(post_id, "a@example.com").unwrap().is_none());
    }
}
