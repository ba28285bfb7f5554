//! Push Pipeline (§4.D): posts, then likes, then comments — never out of
//! order, since a like/comment upserted before its parent post exists would
//! be rejected (or orphaned) server-side.

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::media::MediaUploader;
use crate::model::RecordId;
use crate::notify::{Entity, Notifier};
use crate::remote::{CommentUpsert, LikeUpsert, PostUpsert, RemoteStore};
use crate::retry;
use crate::store::LocalStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushStats {
    pub posts_synced: usize,
    pub posts_failed: usize,
    pub likes_synced: usize,
    pub comments_synced: usize,
}

/// Run one push cycle. Never returns `Err` for a single record's failure —
/// per §7's propagation policy, those are logged and leave the record
/// `is_synced = false` for the next cycle to retry. Posts upsert one at a
/// time, so one exhausted retry only skips that post; a likes/comments
/// batch-upsert failure leaves every record in that batch unsynced but
/// still lets the next phase run.
pub async fn run(
    store: &Arc<dyn LocalStore>,
    remote: &Arc<dyn RemoteStore>,
    uploader: &MediaUploader,
    notifier: &Notifier,
    config: &SyncConfig,
) -> PushStats {
    let mut stats = PushStats::default();

    if store.is_closed() {
        tracing::debug!("push skipped: store is closed");
        return stats;
    }

    push_posts(store, remote, uploader, notifier, config, &mut stats).await;
    push_likes(store, remote, notifier, config, &mut stats).await;
    push_comments(store, remote, notifier, config, &mut stats).await;

    stats
}

/// Posts are pushed one upsert per record, standardized on per-record
/// rather than batch, so a single flaky record can't drag the rest of the
/// phase's progress down with it. Each upsert runs under the Retry
/// Executor on its own (§4.D.1 step 4).
async fn push_posts(
    store: &Arc<dyn LocalStore>,
    remote: &Arc<dyn RemoteStore>,
    uploader: &MediaUploader,
    notifier: &Notifier,
    config: &SyncConfig,
    stats: &mut PushStats,
) {
    let posts = match store.posts_unsynced() {
        Ok(posts) => posts,
        Err(err) => {
            tracing::error!(error = %err, "failed to read unsynced posts");
            return;
        }
    };
    if posts.is_empty() {
        return;
    }

    let mut any_synced = false;

    for mut post in posts {
        if post.needs_media_upload() {
            match uploader
                .upload(
                    post.local_uri.as_deref().unwrap_or_default(),
                    post.id,
                    post.media_type,
                )
                .await
            {
                Some(url) => {
                    if let Err(err) = store.set_post_remote_url(post.id, &url) {
                        tracing::error!(id = %post.id, error = %err, "failed to record remote url");
                        stats.posts_failed += 1;
                        continue;
                    }
                    post.remote_url = Some(url);
                }
                None => {
                    tracing::warn!(id = %post.id, "media upload exhausted retries, post stays unsynced");
                    stats.posts_failed += 1;
                    continue;
                }
            }
        }

        let row = PostUpsert::from_post(&post);
        let id = post.id;
        let result = retry::execute(config, "post-upsert", || {
            let row = std::slice::from_ref(&row);
            async move { remote.upsert_posts(row).await.map_err(|e| e.to_string()) }
        })
        .await;

        match result {
            Some(()) => {
                if let Err(err) = store.mark_post_synced(id) {
                    tracing::error!(%id, error = %err, "failed to mark post synced");
                    stats.posts_failed += 1;
                    continue;
                }
                stats.posts_synced += 1;
                any_synced = true;
            }
            None => {
                tracing::warn!(%id, "post upsert exhausted retries, stays unsynced");
                stats.posts_failed += 1;
            }
        }
    }

    if any_synced {
        notifier.publish(Entity::Post);
    }
}

/// A like/comment is push-eligible only once its parent post is synced
/// (§4.D — parent-before-child). Ineligible records simply wait for the
/// next cycle, once the post phase above has (hopefully) caught them up.
fn parent_is_synced(store: &Arc<dyn LocalStore>, post_id: RecordId) -> bool {
    matches!(store.get_post(post_id), Ok(Some(post)) if post.is_synced)
}

/// Likes have no media and are cheap to re-send, so unlike posts they go
/// out as a single batch upsert under one Retry Executor call (§4.D.2).
/// A batch failure leaves every record in it unsynced and aborts the
/// likes phase for this cycle; comments still get a turn.
async fn push_likes(
    store: &Arc<dyn LocalStore>,
    remote: &Arc<dyn RemoteStore>,
    notifier: &Notifier,
    config: &SyncConfig,
    stats: &mut PushStats,
) {
    let likes = match store.likes_unsynced() {
        Ok(likes) => likes,
        Err(err) => {
            tracing::error!(error = %err, "failed to read unsynced likes");
            return;
        }
    };

    let mut ready_ids = Vec::new();
    let mut batch = Vec::new();
    for like in likes {
        if !parent_is_synced(store, like.post_id) {
            continue;
        }
        ready_ids.push(like.id);
        batch.push(LikeUpsert::from_like(&like));
    }
    if batch.is_empty() {
        return;
    }

    let result = retry::execute(config, "like-batch-upsert", || {
        let batch = &batch;
        async move { remote.upsert_likes(batch).await.map_err(|e| e.to_string()) }
    })
    .await;

    match result {
        Some(()) => {
            if let Err(err) = store.mark_likes_synced(&ready_ids) {
                tracing::error!(error = %err, "failed to mark likes synced");
                return;
            }
            stats.likes_synced += ready_ids.len();
            notifier.publish(Entity::Like);
        }
        None => {
            tracing::warn!(count = batch.len(), "like batch upsert exhausted retries");
        }
    }
}

async fn push_comments(
    store: &Arc<dyn LocalStore>,
    remote: &Arc<dyn RemoteStore>,
    notifier: &Notifier,
    config: &SyncConfig,
    stats: &mut PushStats,
) {
    let comments = match store.comments_unsynced() {
        Ok(comments) => comments,
        Err(err) => {
            tracing::error!(error = %err, "failed to read unsynced comments");
            return;
        }
    };

    let mut ready_ids = Vec::new();
    let mut batch = Vec::new();
    for comment in comments {
        if !parent_is_synced(store, comment.post_id) {
            continue;
        }
        ready_ids.push(comment.id);
        batch.push(CommentUpsert::from_comment(&comment));
    }
    if batch.is_empty() {
        return;
    }

    let result = retry::execute(config, "comment-batch-upsert", || {
        let batch = &batch;
        async move { remote.upsert_comments(batch).await.map_err(|e| e.to_string()) }
    })
    .await;

    match result {
        Some(()) => {
            if let Err(err) = store.mark_comments_synced(&ready_ids) {
                tracing::error!(error = %err, "failed to mark comments synced");
                return;
            }
            stats.comments_synced += ready_ids.len();
            notifier.publish(Entity::Comment);
        }
        None => {
            tracing::warn!(count = batch.len(), "comment batch upsert exhausted retries");
        }
    }
}
