//! Pull Pipeline (§4.E): watermark-based fetch plus a field-level
//! last-write-wins merge for posts and comments (likes have no mergeable
//! fields beyond their tombstone, so a pending local toggle simply wins
//! until it is pushed).

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::SyncConfig;
use crate::model::{Comment, Like, MediaType, Post};
use crate::notify::{Entity, Notifier};
use crate::remote::{RemoteComment, RemoteLike, RemotePost, RemoteStore};
use crate::retry;
use crate::store::LocalStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullStats {
    pub posts_applied: usize,
    pub likes_applied: usize,
    pub comments_applied: usize,
}

pub async fn run(
    store: &Arc<dyn LocalStore>,
    remote: &Arc<dyn RemoteStore>,
    notifier: &Notifier,
    config: &SyncConfig,
) -> PullStats {
    let mut stats = PullStats::default();

    if store.is_closed() {
        tracing::debug!("pull skipped: store is closed");
        return stats;
    }

    let settings = match store.settings() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!(error = %err, "failed to read sync watermark");
            return stats;
        }
    };
    let watermark = settings.last_sync_time;
    let mut new_watermark = watermark;

    // Every remote read is run under the Retry Executor (§2's control-flow
    // table: "Pull drives Retry Executor"); exhaustion degrades that
    // section of the cycle to a no-op rather than aborting the whole pull.
    let remote_posts = match retry::execute(config, "fetch-posts", || {
        remote.fetch_posts_since(watermark, config.pull_posts_limit)
    })
    .await
    {
        Some(rows) => rows,
        None => {
            tracing::warn!("fetch posts since watermark exhausted retries");
            return stats;
        }
    };
    let remote_likes = match retry::execute(config, "fetch-likes", || {
        remote.fetch_likes_since(watermark, config.pull_children_limit)
    })
    .await
    {
        Some(rows) => rows,
        None => {
            tracing::warn!("fetch likes since watermark exhausted retries");
            Vec::new()
        }
    };
    let remote_comments = match retry::execute(config, "fetch-comments", || {
        remote.fetch_comments_since(watermark, config.pull_children_limit)
    })
    .await
    {
        Some(rows) => rows,
        None => {
            tracing::warn!("fetch comments since watermark exhausted retries");
            Vec::new()
        }
    };

    for row in &remote_posts {
        if row.updated_at > new_watermark {
            new_watermark = row.updated_at;
        }
    }

    let mut merged_posts = Vec::with_capacity(remote_posts.len());
    for remote_post in &remote_posts {
        let local = match store.get_post(remote_post.id) {
            Ok(local) => local,
            Err(err) => {
                tracing::error!(id = %remote_post.id, error = %err, "failed to read local post for merge");
                continue;
            }
        };
        merged_posts.push(merge_post(local, remote_post));
    }

    if !merged_posts.is_empty() || new_watermark > watermark {
        match store.apply_pull_posts(&merged_posts, new_watermark) {
            Ok(n) => {
                stats.posts_applied = n;
                if n > 0 {
                    notifier.publish(Entity::Post);
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to apply pulled posts");
            }
        }
    }

    let mut merged_likes = Vec::with_capacity(remote_likes.len());
    for remote_like in &remote_likes {
        let local = match store.get_like(remote_like.id) {
            Ok(local) => local,
            Err(err) => {
                tracing::error!(id = %remote_like.id, error = %err, "failed to read local like for merge");
                continue;
            }
        };
        merged_likes.push(merge_like(local, remote_like));
    }
    if !merged_likes.is_empty() {
        match store.apply_pull_likes(&merged_likes) {
            Ok(n) => {
                stats.likes_applied = n;
                notifier.publish(Entity::Like);
            }
            Err(err) => tracing::error!(error = %err, "failed to apply pulled likes"),
        }
    }

    let mut merged_comments = Vec::with_capacity(remote_comments.len());
    for remote_comment in &remote_comments {
        let local = match store.get_comment(remote_comment.id) {
            Ok(local) => local,
            Err(err) => {
                tracing::error!(id = %remote_comment.id, error = %err, "failed to read local comment for merge");
                continue;
            }
        };
        merged_comments.push(merge_comment(local, remote_comment));
    }
    if !merged_comments.is_empty() {
        match store.apply_pull_comments(&merged_comments) {
            Ok(n) => {
                stats.comments_applied = n;
                notifier.publish(Entity::Comment);
            }
            Err(err) => tracing::error!(error = %err, "failed to apply pulled comments"),
        }
    }

    stats
}

fn remote_media_url(remote: &RemotePost) -> Option<String> {
    match remote.media_type {
        Some(MediaType::Video) => remote.video_url.clone(),
        _ => remote.image_url.clone(),
    }
}

/// §4.E.3's three-way rule applied independently per field: take remote if
/// only remote changed since the last sync, keep local if only local
/// changed, and fall back to whichever side's timestamp is newer if both
/// did.
fn merge_post(local: Option<Post>, remote: &RemotePost) -> Post {
    let remote_text = remote.text.clone();
    let remote_url = remote_media_url(remote);

    let Some(local) = local else {
        return Post {
            id: remote.id,
            text: remote_text.clone(),
            timestamp: remote.timestamp,
            media_type: remote.media_type.unwrap_or(MediaType::Image),
            local_uri: None,
            remote_url: remote_url.clone(),
            thumbnail_url: remote.thumbnail_url.clone(),
            user_email: remote.user_email.clone().unwrap_or_default(),
            is_synced: true,
            deleted_at: remote.deleted_at,
            synced_text: Some(remote_text),
            synced_remote_url: remote_url,
        };
    };

    let text_locally_changed = local.text != local.synced_text.clone().unwrap_or_default();
    let text_remotely_changed = local.synced_text.as_deref() != Some(remote_text.as_str());
    let new_text = match (text_locally_changed, text_remotely_changed) {
        (true, true) => {
            if remote.updated_at >= local.timestamp {
                remote_text.clone()
            } else {
                local.text.clone()
            }
        }
        (true, false) => local.text.clone(),
        (false, _) => remote_text.clone(),
    };

    let url_locally_changed = local.remote_url != local.synced_remote_url;
    let url_remotely_changed = local.synced_remote_url != remote_url;
    let new_url = match (url_locally_changed, url_remotely_changed) {
        (true, true) => {
            if remote.updated_at >= local.timestamp {
                remote_url.clone()
            } else {
                local.remote_url.clone()
            }
        }
        (true, false) => local.remote_url.clone(),
        (false, _) => remote_url.clone(),
    };

    let new_deleted_at = match (local.deleted_at, remote.deleted_at) {
        (Some(local_ts), Some(remote_ts)) => Some(local_ts.min(remote_ts)),
        (Some(local_ts), None) => Some(local_ts),
        (None, other) => other,
    };

    let is_synced = new_text == remote_text && new_url == remote_url && new_deleted_at == remote.deleted_at;

    Post {
        id: local.id,
        text: new_text,
        timestamp: if is_synced { remote.timestamp } else { local.timestamp },
        media_type: local.media_type,
        local_uri: local.local_uri,
        remote_url: new_url,
        thumbnail_url: remote.thumbnail_url.clone().or(local.thumbnail_url),
        user_email: local.user_email,
        is_synced,
        deleted_at: new_deleted_at,
        synced_text: Some(remote_text),
        synced_remote_url: remote_url,
    }
}

/// A like has no mergeable content beyond its tombstone: an unsynced local
/// toggle represents a change the user made after the last successful
/// push and always wins until that push lands.
fn merge_like(local: Option<Like>, remote: &RemoteLike) -> Like {
    if let Some(local) = &local {
        if !local.is_synced {
            return local.clone();
        }
    }
    Like {
        id: remote.id,
        post_id: remote.post_id,
        user_email: remote.user_email.clone(),
        is_synced: true,
        deleted_at: remote.deleted_at,
    }
}

fn merge_comment(local: Option<Comment>, remote: &RemoteComment) -> Comment {
    let Some(local) = local else {
        return Comment {
            id: remote.id,
            post_id: remote.post_id,
            user_email: remote.user_email.clone(),
            text: remote.text.clone(),
            timestamp: remote.created_at,
            is_synced: true,
            deleted_at: remote.deleted_at,
            synced_text: Some(remote.text.clone()),
        };
    };

    let text_locally_changed = local.text != local.synced_text.clone().unwrap_or_default();
    let text_remotely_changed = local.synced_text.as_deref() != Some(remote.text.as_str());
    let new_text = match (text_locally_changed, text_remotely_changed) {
        (true, true) => {
            if remote.updated_at >= local.timestamp {
                remote.text.clone()
            } else {
                local.text.clone()
            }
        }
        (true, false) => local.text.clone(),
        (false, _) => remote.text.clone(),
    };

    let new_deleted_at = match (local.deleted_at, remote.deleted_at) {
        (Some(local_ts), Some(remote_ts)) => Some(local_ts.min(remote_ts)),
        (Some(local_ts), None) => Some(local_ts),
        (None, other) => other,
    };

    let is_synced = new_text == remote.text && new_deleted_at == remote.deleted_at;

    Comment {
        id: local.id,
        post_id: local.post_id,
        user_email: local.user_email,
        text: new_text,
        timestamp: if is_synced { remote.created_at } else { local.timestamp },
        is_synced,
        deleted_at: new_deleted_at,
        synced_text: Some(remote.text.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordId;
    use crate::store::InMemoryStore;
    use crate::testing::FakeRemoteStore;
    use chrono::Duration;

    fn harness() -> (Arc<dyn LocalStore>, Arc<FakeRemoteStore>, Notifier, SyncConfig) {
        (
            Arc::new(InMemoryStore::new()),
            Arc::new(FakeRemoteStore::new()),
            Notifier::new(),
            SyncConfig::default(),
        )
    }

    fn remote_post(id: RecordId, text: &str, updated_at: DateTime<Utc>) -> RemotePost {
        RemotePost {
            id,
            text: text.into(),
            image_url: None,
            video_url: None,
            media_type: Some(MediaType::Image),
            thumbnail_url: None,
            timestamp: updated_at,
            user_email: Some("a@example.com".into()),
            deleted_at: None,
            updated_at,
        }
    }

    #[tokio::test]
    async fn new_remote_post_is_inserted_and_marked_synced() {
        let (store, remote, notifier, config) = harness();
        let id = RecordId::new();
        remote.seed_post(remote_post(id, "hello", Utc::now()));
        let remote_dyn: Arc<dyn RemoteStore> = remote.clone();

        let stats = run(&store, &remote_dyn, &notifier, &config).await;

        assert_eq!(stats.posts_applied, 1);
        let post = store.get_post(id).unwrap().unwrap();
        assert_eq!(post.text, "hello");
        assert!(post.is_synced);
    }

    #[tokio::test]
    async fn watermark_advances_monotonically() {
        let (store, remote, notifier, config) = harness();
        let t1 = Utc::now() - Duration::hours(2);
        remote.seed_post(remote_post(RecordId::new(), "a", t1));
        let remote_dyn: Arc<dyn RemoteStore> = remote.clone();

        run(&store, &remote_dyn, &notifier, &config).await;
        let after_first = store.settings().unwrap().last_sync_time;
        assert_eq!(after_first, t1);

        // Nothing new to fetch: watermark must not regress.
        run(&store, &remote_dyn, &notifier, &config).await;
        let after_second = store.settings().unwrap().last_sync_time;
        assert_eq!(after_second, t1);
    }

    #[tokio::test]
    async fn local_only_change_survives_a_pull_of_stale_remote_state() {
        let (store, remote, notifier, config) = harness();
        let id = RecordId::new();
        let base_time = Utc::now() - Duration::hours(1);

        // Local already knows about this post from a previous sync.
        store
            .create_post(Post {
                id,
                text: "local edited".into(),
                timestamp: Utc::now(),
                media_type: MediaType::Image,
                local_uri: None,
                remote_url: None,
                thumbnail_url: None,
                user_email: "a@example.com".into(),
                is_synced: false,
                deleted_at: None,
                synced_text: Some("original".into()),
                synced_remote_url: None,
            })
            .unwrap();
        // The remote hasn't seen the edit yet: still "original".
        remote.seed_post(remote_post(id, "original", base_time));
        let remote_dyn: Arc<dyn RemoteStore> = remote.clone();

        run(&store, &remote_dyn, &notifier, &config).await;

        let post = store.get_post(id).unwrap().unwrap();
        assert_eq!(post.text, "local edited");
        assert!(!post.is_synced); // still needs a push
    }

    #[tokio::test]
    async fn remote_only_change_is_adopted() {
        let (store, remote, notifier, config) = harness();
        let id = RecordId::new();

        store
            .create_post(Post {
                id,
                text: "original".into(),
                timestamp: Utc::now() - Duration::hours(2),
                media_type: MediaType::Image,
                local_uri: None,
                remote_url: None,
                thumbnail_url: None,
                user_email: "a@example.com".into(),
                is_synced: true,
                deleted_at: None,
                synced_text: Some("original".into()),
                synced_remote_url: None,
            })
            .unwrap();
        remote.seed_post(remote_post(id, "edited elsewhere", Utc::now()));
        let remote_dyn: Arc<dyn RemoteStore> = remote.clone();

        run(&store, &remote_dyn, &notifier, &config).await;

        let post = store.get_post(id).unwrap().unwrap();
        assert_eq!(post.text, "edited elsewhere");
        assert!(post.is_synced);
    }
}
