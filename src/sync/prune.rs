//! Pruner (§4.F): thin wrapper over [`LocalStore::prune`] — the three-phase
//! tombstone GC / size cap / orphan sweep algorithm lives once, in each
//! backend, since it needs to run inside that backend's own transaction.

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::notify::{Entity, Notifier};
use crate::store::LocalStore;
pub use crate::store::PruneStats;

pub async fn run(
    store: &Arc<dyn LocalStore>,
    notifier: &Notifier,
    config: &SyncConfig,
    now: chrono::DateTime<chrono::Utc>,
) -> PruneStats {
    if store.is_closed() {
        tracing::debug!("prune skipped: store is closed");
        return PruneStats::default();
    }

    match store.prune(config.retention, config.max_active_posts, now) {
        Ok(stats) => {
            if stats.posts_deleted > 0 {
                notifier.publish(Entity::Post);
            }
            if stats.likes_deleted > 0 {
                notifier.publish(Entity::Like);
            }
            if stats.comments_deleted > 0 {
                notifier.publish(Entity::Comment);
            }
            tracing::debug!(
                posts = stats.posts_deleted,
                likes = stats.likes_deleted,
                comments = stats.comments_deleted,
                "prune cycle complete"
            );
            stats
        }
        Err(err) => {
            tracing::error!(error = %err, "prune cycle failed");
            PruneStats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MediaType, Post, RecordId};
    use crate::store::InMemoryStore;
    use chrono::Utc;

    #[tokio::test]
    async fn prune_is_noop_on_empty_store() {
        let store: Arc<dyn LocalStore> = Arc::new(InMemoryStore::new());
        let stats = run(&store, &Notifier::new(), &SyncConfig::default(), Utc::now()).await;
        assert_eq!(stats.posts_deleted, 0);
    }

    #[tokio::test]
    async fn prune_removes_old_tombstones() {
        let inner = InMemoryStore::new();
        let now = Utc::now();
        inner
            .create_post(Post {
                id: RecordId::new(),
                text: "gone".into(),
                timestamp: now,
                media_type: MediaType::Image,
                local_uri: None,
                remote_url: None,
                thumbnail_url: None,
                user_email: "a@example.com".into(),
                is_synced: true,
                deleted_at: Some(now - chrono::Duration::days(45)),
                synced_text: Some("gone".into()),
                synced_remote_url: None,
            })
            .unwrap();
        let store: Arc<dyn LocalStore> = Arc::new(inner);

        let stats = run(&store, &Notifier::new(), &SyncConfig::default(), now).await;
        assert_eq!(stats.posts_deleted, 1);
    }
}
