//! End-to-end scenarios exercising the full push/pull/prune cycle through
//! [`SyncManager`] rather than any single pipeline in isolation.

use std::sync::Arc;

use chrono::{Duration, Utc};
use feedsync::config::SyncConfig;
use feedsync::media::MediaUploader;
use feedsync::model::{Comment, Like, MediaType, Post, RecordId};
use feedsync::path::PathResolver;
use feedsync::store::{InMemoryStore, LocalStore};
use feedsync::sync::SyncManager;
use feedsync::testing::{FakeObjectStore, FakeRemoteStore};

fn post(text: &str, user: &str) -> Post {
    Post {
        id: RecordId::new(),
        text: text.into(),
        timestamp: Utc::now(),
        media_type: MediaType::Image,
        local_uri: None,
        remote_url: None,
        thumbnail_url: None,
        user_email: user.into(),
        is_synced: false,
        deleted_at: None,
        synced_text: None,
        synced_remote_url: None,
    }
}

fn manager_with(
    store: Arc<InMemoryStore>,
    remote: Arc<FakeRemoteStore>,
) -> SyncManager {
    let uploader = MediaUploader::new(
        PathResolver::new(std::env::temp_dir()),
        Arc::new(FakeObjectStore::new()),
        SyncConfig::default(),
    );
    SyncManager::new(store, remote, uploader, SyncConfig::default())
}

// S1 — a freshly authored post, like, and comment all reach the server in
// one background tick, in dependency order.
#[tokio::test]
async fn s1_full_authoring_then_sync_round_trip() {
    let store = Arc::new(InMemoryStore::new());
    let remote = Arc::new(FakeRemoteStore::new());

    let p = post("first post", "alice@example.com");
    let post_id = p.id;
    store.create_post(p).unwrap();
    store
        .create_like(Like {
            id: RecordId::new(),
            post_id,
            user_email: "bob@example.com".into(),
            is_synced: false,
            deleted_at: None,
        })
        .unwrap();
    store
        .create_comment(Comment {
            id: RecordId::new(),
            post_id,
            user_email: "bob@example.com".into(),
            text: "nice shot".into(),
            timestamp: Utc::now(),
            is_synced: false,
            deleted_at: None,
            synced_text: None,
        })
        .unwrap();

    let manager = manager_with(store.clone(), remote.clone());
    manager.background_tick(Utc::now()).await;

    assert!(store.posts_unsynced().unwrap().is_empty());
    assert!(store.likes_unsynced().unwrap().is_empty());
    assert!(store.comments_unsynced().unwrap().is_empty());
    assert_eq!(remote.post_count(), 1);
}

// S2 — the same push cycle run twice in a row is idempotent: nothing new
// is sent and no duplicate remote state is created.
#[tokio::test(start_paused = true)]
async fn s2_repeated_push_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    let remote = Arc::new(FakeRemoteStore::new());
    store.create_post(post("only post", "alice@example.com")).unwrap();

    let manager = manager_with(store.clone(), remote.clone());
    let first = manager.trigger_push().await.unwrap();
    // The cooldown would otherwise reject an immediate second attempt
    // (covered in scheduler's own unit tests); advance past it here to
    // isolate idempotency from cooldown behavior.
    tokio::time::advance(SyncConfig::default().push_cooldown + std::time::Duration::from_millis(1)).await;
    let second = manager.trigger_push().await.unwrap();

    assert_eq!(first.posts_synced, 1);
    assert_eq!(second.posts_synced, 0);
    assert_eq!(remote.post_count(), 1);
}

// S3 — a like/comment created before their parent post has synced wait
// until the post catches up, and do so within the same tick once the post
// phase runs first.
#[tokio::test]
async fn s3_children_wait_for_parent_ordering() {
    let store = Arc::new(InMemoryStore::new());
    let remote = Arc::new(FakeRemoteStore::new());
    let p = post("parent", "alice@example.com");
    let post_id = p.id;
    store.create_post(p).unwrap();
    store
        .create_like(Like {
            id: RecordId::new(),
            post_id,
            user_email: "bob@example.com".into(),
            is_synced: false,
            deleted_at: None,
        })
        .unwrap();

    let manager = manager_with(store.clone(), remote.clone());
    let stats = manager.trigger_push().await.unwrap();

    assert_eq!(stats.posts_synced, 1);
    assert_eq!(stats.likes_synced, 1);
}

// S4 — toggling a like twice (like, unlike) before ever syncing leaves at
// most one active like row, never two.
#[tokio::test]
async fn s4_like_toggle_never_creates_a_second_row() {
    let store = InMemoryStore::new();
    let like_id = RecordId::new();
    let post_id = RecordId::new();
    store
        .create_like(Like {
            id: like_id,
            post_id,
            user_email: "bob@example.com".into(),
            is_synced: true,
            deleted_at: None,
        })
        .unwrap();

    store.toggle_like(like_id, Utc::now()).unwrap();
    store.toggle_like(like_id, Utc::now()).unwrap();

    assert_eq!(store.all_likes().unwrap().len(), 1);
    assert!(store.all_likes().unwrap()[0].deleted_at.is_none());
}

// S5 — a pull cycle merges remote edits into local state without clobbering
// a concurrent, not-yet-pushed local edit to a different field.
#[tokio::test]
async fn s5_pull_merges_remote_state_for_unrelated_posts() {
    let store = Arc::new(InMemoryStore::new());
    let remote = Arc::new(FakeRemoteStore::new());
    remote.seed_post(feedsync::remote::RemotePost {
        id: RecordId::new(),
        text: "from another device".into(),
        image_url: None,
        video_url: None,
        media_type: Some(MediaType::Image),
        thumbnail_url: None,
        timestamp: Utc::now(),
        user_email: Some("carol@example.com".into()),
        deleted_at: None,
        updated_at: Utc::now(),
    });

    let manager = manager_with(store.clone(), remote.clone());
    let stats = manager.pull().await;

    assert_eq!(stats.posts_applied, 1);
    let posts = store.all_posts().unwrap();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].is_synced);
}

// S6 — pruning respects the retention window and size cap together, and
// sweeps orphaned children left behind by a pruned post.
#[tokio::test]
async fn s6_prune_enforces_retention_cap_and_orphan_sweep() {
    let store = InMemoryStore::new();
    let now = Utc::now();
    let mut survivor_id = None;

    for i in 0..10i64 {
        let mut p = post(&format!("post {i}"), "alice@example.com");
        p.is_synced = true;
        p.timestamp = now - Duration::days(10 - i);
        if i == 9 {
            survivor_id = Some(p.id);
        }
        store.create_post(p).unwrap();
    }
    let mut tombstoned = post("old deleted", "alice@example.com");
    tombstoned.is_synced = true;
    tombstoned.deleted_at = Some(now - Duration::days(31));
    let tombstoned_id = tombstoned.id;
    store.create_post(tombstoned).unwrap();

    store
        .create_like(Like {
            id: RecordId::new(),
            post_id: tombstoned_id,
            user_email: "bob@example.com".into(),
            is_synced: true,
            deleted_at: None,
        })
        .unwrap();

    let config = SyncConfig {
        max_active_posts: 5,
        ..SyncConfig::default()
    };
    let store: Arc<dyn LocalStore> = Arc::new(store);
    let stats = store.prune(config.retention, config.max_active_posts, now).unwrap();

    assert!(stats.posts_deleted >= 6); // tombstone + overflow beyond cap of 5
    assert!(stats.likes_deleted >= 1); // the orphaned like on the tombstoned post
    assert!(store.get_post(survivor_id.unwrap()).unwrap().is_some());
    assert!(store.get_post(tombstoned_id).unwrap().is_none());
}
