//! `rusqlite`-backed [`LocalStore`] (§6.6 — schema version 7).
//!
//! A single `Mutex<Connection>` gives single-writer transaction discipline:
//! every public method opens exactly one `Connection::transaction()` (or
//! none, for pure reads), matching §5's "short, synchronous transactions;
//! no remote I/O while a transaction is open".

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::StoreError;
use crate::model::{Comment, Like, MediaType, Post, RecordId, SystemSettings};
use crate::store::traits::{LocalStore, PruneStats};

/// §6.6.
pub const SCHEMA_VERSION: i32 = 7;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    closed: std::sync::atomic::AtomicBool,
}

impl SqliteStore {
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_meta (version INTEGER NOT NULL);
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                media_type TEXT NOT NULL,
                local_uri TEXT,
                remote_url TEXT,
                thumbnail_url TEXT,
                user_email TEXT NOT NULL,
                is_synced INTEGER NOT NULL,
                deleted_at TEXT,
                synced_text TEXT,
                synced_remote_url TEXT
            );
            CREATE TABLE IF NOT EXISTS likes (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL,
                user_email TEXT NOT NULL,
                is_synced INTEGER NOT NULL,
                deleted_at TEXT
            );
            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL,
                user_email TEXT NOT NULL,
                text TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                is_synced INTEGER NOT NULL,
                deleted_at TEXT,
                synced_text TEXT
            );
            CREATE TABLE IF NOT EXISTS system_settings (
                id TEXT PRIMARY KEY,
                last_sync_time TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_likes_post_user ON likes(post_id, user_email);
            CREATE INDEX IF NOT EXISTS idx_likes_post ON likes(post_id);
            CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);
            ",
        )?;
        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_meta LIMIT 1", [], |r| r.get(0))
            .optional()?;
        if version.is_none() {
            conn.execute(
                "INSERT INTO schema_meta (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
            closed: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn from_rfc3339(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::NotFound(format!("bad timestamp {s}: {e}")))
}

fn row_to_post(row: &Row) -> rusqlite::Result<(String, String, String, String, Option<String>, Option<String>, Option<String>, String, bool, Option<String>, Option<String>, Option<String>)> {
    Ok((
        row.get("id")?,
        row.get("text")?,
        row.get("timestamp")?,
        row.get("media_type")?,
        row.get("local_uri")?,
        row.get("remote_url")?,
        row.get("thumbnail_url")?,
        row.get("user_email")?,
        row.get::<_, i64>("is_synced")? != 0,
        row.get("deleted_at")?,
        row.get("synced_text")?,
        row.get("synced_remote_url")?,
    ))
}

fn post_from_tuple(
    t: (String, String, String, String, Option<String>, Option<String>, Option<String>, String, bool, Option<String>, Option<String>, Option<String>),
) -> Result<Post, StoreError> {
    let (id, text, timestamp, media_type, local_uri, remote_url, thumbnail_url, user_email, is_synced, deleted_at, synced_text, synced_remote_url) = t;
    Ok(Post {
        id: RecordId::from_hex(&id)?,
        text,
        timestamp: from_rfc3339(&timestamp)?,
        media_type: if media_type == "video" {
            MediaType::Video
        } else {
            MediaType::Image
        },
        local_uri,
        remote_url,
        thumbnail_url,
        user_email,
        is_synced,
        deleted_at: deleted_at.map(|s| from_rfc3339(&s)).transpose()?,
        synced_text,
        synced_remote_url,
    })
}

fn row_to_like(row: &Row) -> rusqlite::Result<(String, String, String, bool, Option<String>)> {
    Ok((
        row.get("id")?,
        row.get("post_id")?,
        row.get("user_email")?,
        row.get::<_, i64>("is_synced")? != 0,
        row.get("deleted_at")?,
    ))
}

fn like_from_tuple(t: (String, String, String, bool, Option<String>)) -> Result<Like, StoreError> {
    let (id, post_id, user_email, is_synced, deleted_at) = t;
    Ok(Like {
        id: RecordId::from_hex(&id)?,
        post_id: RecordId::from_hex(&post_id)?,
        user_email,
        is_synced,
        deleted_at: deleted_at.map(|s| from_rfc3339(&s)).transpose()?,
    })
}

fn row_to_comment(row: &Row) -> rusqlite::Result<(String, String, String, String, String, bool, Option<String>, Option<String>)> {
    Ok((
        row.get("id")?,
        row.get("post_id")?,
        row.get("user_email")?,
        row.get("text")?,
        row.get("timestamp")?,
        row.get::<_, i64>("is_synced")? != 0,
        row.get("deleted_at")?,
        row.get("synced_text")?,
    ))
}

fn comment_from_tuple(
    t: (String, String, String, String, String, bool, Option<String>, Option<String>),
) -> Result<Comment, StoreError> {
    let (id, post_id, user_email, text, timestamp, is_synced, deleted_at, synced_text) = t;
    Ok(Comment {
        id: RecordId::from_hex(&id)?,
        post_id: RecordId::from_hex(&post_id)?,
        user_email,
        text,
        timestamp: from_rfc3339(&timestamp)?,
        is_synced,
        deleted_at: deleted_at.map(|s| from_rfc3339(&s)).transpose()?,
        synced_text,
    })
}

fn upsert_post(conn: &Connection, post: &Post) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO posts (id, text, timestamp, media_type, local_uri, remote_url, thumbnail_url, user_email, is_synced, deleted_at, synced_text, synced_remote_url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(id) DO UPDATE SET
            text = excluded.text,
            timestamp = excluded.timestamp,
            media_type = excluded.media_type,
            local_uri = excluded.local_uri,
            remote_url = excluded.remote_url,
            thumbnail_url = excluded.thumbnail_url,
            user_email = excluded.user_email,
            is_synced = excluded.is_synced,
            deleted_at = excluded.deleted_at,
            synced_text = excluded.synced_text,
            synced_remote_url = excluded.synced_remote_url",
        params![
            post.id.as_hex(),
            post.text,
            to_rfc3339(post.timestamp),
            post.media_type.as_str(),
            post.local_uri,
            post.remote_url,
            post.thumbnail_url,
            post.user_email,
            post.is_synced as i64,
            post.deleted_at.map(to_rfc3339),
            post.synced_text,
            post.synced_remote_url,
        ],
    )?;
    Ok(())
}

fn upsert_like(conn: &Connection, like: &Like) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO likes (id, post_id, user_email, is_synced, deleted_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            post_id = excluded.post_id,
            user_email = excluded.user_email,
            is_synced = excluded.is_synced,
            deleted_at = excluded.deleted_at",
        params![
            like.id.as_hex(),
            like.post_id.as_hex(),
            like.user_email,
            like.is_synced as i64,
            like.deleted_at.map(to_rfc3339),
        ],
    )?;
    Ok(())
}

fn upsert_comment(conn: &Connection, comment: &Comment) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO comments (id, post_id, user_email, text, timestamp, is_synced, deleted_at, synced_text)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
            post_id = excluded.post_id,
            user_email = excluded.user_email,
            text = excluded.text,
            timestamp = excluded.timestamp,
            is_synced = excluded.is_synced,
            deleted_at = excluded.deleted_at,
            synced_text = excluded.synced_text",
        params![
            comment.id.as_hex(),
            comment.post_id.as_hex(),
            comment.user_email,
            comment.text,
            to_rfc3339(comment.timestamp),
            comment.is_synced as i64,
            comment.deleted_at.map(to_rfc3339),
            comment.synced_text,
        ],
    )?;
    Ok(())
}

impl LocalStore for SqliteStore {
    fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn posts_unsynced(&self) -> Result<Vec<Post>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM posts WHERE is_synced = 0")?;
        let rows = stmt
            .query_map([], row_to_post)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(post_from_tuple).collect()
    }

    fn likes_unsynced(&self) -> Result<Vec<Like>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM likes WHERE is_synced = 0")?;
        let rows = stmt
            .query_map([], row_to_like)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(like_from_tuple).collect()
    }

    fn comments_unsynced(&self) -> Result<Vec<Comment>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM comments WHERE is_synced = 0")?;
        let rows = stmt
            .query_map([], row_to_comment)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(comment_from_tuple).collect()
    }

    fn get_post(&self, id: RecordId) -> Result<Option<Post>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row("SELECT * FROM posts WHERE id = ?1", params![id.as_hex()], row_to_post)
            .optional()?;
        row.map(post_from_tuple).transpose()
    }

    fn get_like(&self, id: RecordId) -> Result<Option<Like>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row("SELECT * FROM likes WHERE id = ?1", params![id.as_hex()], row_to_like)
            .optional()?;
        row.map(like_from_tuple).transpose()
    }

    fn get_comment(&self, id: RecordId) -> Result<Option<Comment>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT * FROM comments WHERE id = ?1",
                params![id.as_hex()],
                row_to_comment,
            )
            .optional()?;
        row.map(comment_from_tuple).transpose()
    }

    fn active_like_for(
        &self,
        post_id: RecordId,
        user_email: &str,
    ) -> Result<Option<Like>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT * FROM likes WHERE post_id = ?1 AND user_email = ?2 AND deleted_at IS NULL",
                params![post_id.as_hex(), user_email],
                row_to_like,
            )
            .optional()?;
        row.map(like_from_tuple).transpose()
    }

    fn create_post(&self, post: Post) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        upsert_post(&conn, &post)
    }

    fn create_like(&self, like: Like) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        upsert_like(&conn, &like)
    }

    fn create_comment(&self, comment: Comment) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        upsert_comment(&conn, &comment)
    }

    fn toggle_like(&self, id: RecordId, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut like = {
            let row = tx
                .query_row("SELECT * FROM likes WHERE id = ?1", params![id.as_hex()], row_to_like)
                .optional()?;
            like_from_tuple(row.ok_or_else(|| StoreError::NotFound(id.to_string()))?)?
        };
        crate::model::toggle_like(&mut like, now);
        upsert_like(&tx, &like)?;
        tx.commit()?;
        Ok(())
    }

    fn like_post(
        &self,
        post_id: RecordId,
        user_email: &str,
        now: DateTime<Utc>,
    ) -> Result<RecordId, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let existing = tx
            .query_row(
                "SELECT * FROM likes WHERE post_id = ?1 AND user_email = ?2",
                params![post_id.as_hex(), user_email],
                row_to_like,
            )
            .optional()?;
        let id = match existing {
            Some(row) => {
                let mut like = like_from_tuple(row)?;
                if like.deleted_at.is_some() {
                    crate::model::toggle_like(&mut like, now);
                    upsert_like(&tx, &like)?;
                }
                like.id
            }
            None => {
                let id = RecordId::new();
                let like = Like {
                    id,
                    post_id,
                    user_email: user_email.to_string(),
                    is_synced: false,
                    deleted_at: None,
                };
                upsert_like(&tx, &like)?;
                id
            }
        };
        tx.commit()?;
        Ok(id)
    }

    fn soft_delete_post(&self, id: RecordId, now: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE posts SET deleted_at = ?1, is_synced = 0 WHERE id = ?2",
            params![to_rfc3339(now), id.as_hex()],
        )?;
        Ok(())
    }

    fn soft_delete_comment(&self, id: RecordId, now: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE comments SET deleted_at = ?1, is_synced = 0 WHERE id = ?2",
            params![to_rfc3339(now), id.as_hex()],
        )?;
        Ok(())
    }

    fn set_post_remote_url(&self, id: RecordId, remote_url: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE posts SET remote_url = ?1 WHERE id = ?2",
            params![remote_url, id.as_hex()],
        )?;
        Ok(())
    }

    fn mark_post_synced(&self, id: RecordId) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE posts SET is_synced = 1, synced_text = text, synced_remote_url = remote_url WHERE id = ?1",
            params![id.as_hex()],
        )?;
        Ok(())
    }

    fn mark_likes_synced(&self, ids: &[RecordId]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for id in ids {
            tx.execute(
                "UPDATE likes SET is_synced = 1 WHERE id = ?1",
                params![id.as_hex()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn mark_comments_synced(&self, ids: &[RecordId]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for id in ids {
            tx.execute(
                "UPDATE comments SET is_synced = 1, synced_text = text WHERE id = ?1",
                params![id.as_hex()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn apply_pull_posts(
        &self,
        posts: &[Post],
        new_watermark: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for post in posts {
            upsert_post(&tx, post)?;
        }
        let existing: Option<String> = tx
            .query_row("SELECT last_sync_time FROM system_settings LIMIT 1", [], |r| r.get(0))
            .optional()?;
        let current = existing.map(|s| from_rfc3339(&s)).transpose()?;
        if current.map(|c| new_watermark > c).unwrap_or(true) {
            let id = RecordId::new().as_hex();
            tx.execute("DELETE FROM system_settings", [])?;
            tx.execute(
                "INSERT INTO system_settings (id, last_sync_time) VALUES (?1, ?2)",
                params![id, to_rfc3339(new_watermark)],
            )?;
        }
        tx.commit()?;
        Ok(posts.len())
    }

    fn apply_pull_likes(&self, likes: &[Like]) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for like in likes {
            upsert_like(&tx, like)?;
        }
        tx.commit()?;
        Ok(likes.len())
    }

    fn apply_pull_comments(&self, comments: &[Comment]) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for comment in comments {
            upsert_comment(&tx, comment)?;
        }
        tx.commit()?;
        Ok(comments.len())
    }

    fn settings(&self) -> Result<SystemSettings, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let row: Option<(String, String)> = tx
            .query_row("SELECT id, last_sync_time FROM system_settings LIMIT 1", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .optional()?;
        let settings = match row {
            Some((id, ts)) => SystemSettings {
                id: RecordId::from_hex(&id)?,
                last_sync_time: from_rfc3339(&ts)?,
            },
            None => {
                let fresh = SystemSettings::fresh(RecordId::new());
                tx.execute(
                    "INSERT INTO system_settings (id, last_sync_time) VALUES (?1, ?2)",
                    params![fresh.id.as_hex(), to_rfc3339(fresh.last_sync_time)],
                )?;
                fresh
            }
        };
        tx.commit()?;
        Ok(settings)
    }

    fn prune(
        &self,
        retention: chrono::Duration,
        max_active_posts: usize,
        now: DateTime<Utc>,
    ) -> Result<PruneStats, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let cutoff = to_rfc3339(now - retention);
        let mut stats = PruneStats::default();

        stats.posts_deleted += tx.execute(
            "DELETE FROM posts WHERE is_synced = 1 AND deleted_at IS NOT NULL AND deleted_at < ?1",
            params![cutoff],
        )?;
        stats.likes_deleted += tx.execute(
            "DELETE FROM likes WHERE is_synced = 1 AND deleted_at IS NOT NULL AND deleted_at < ?1",
            params![cutoff],
        )?;
        stats.comments_deleted += tx.execute(
            "DELETE FROM comments WHERE is_synced = 1 AND deleted_at IS NOT NULL AND deleted_at < ?1",
            params![cutoff],
        )?;

        let active_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM posts WHERE deleted_at IS NULL AND is_synced = 1",
            [],
            |r| r.get(0),
        )?;
        if active_count as usize > max_active_posts {
            let overflow = active_count as usize - max_active_posts;
            stats.posts_deleted += tx.execute(
                "DELETE FROM posts WHERE id IN (
                    SELECT id FROM posts WHERE deleted_at IS NULL AND is_synced = 1
                    ORDER BY timestamp ASC LIMIT ?1
                )",
                params![overflow as i64],
            )?;
        }

        stats.likes_deleted += tx.execute(
            "DELETE FROM likes WHERE post_id NOT IN (SELECT id FROM posts)",
            [],
        )?;
        stats.comments_deleted += tx.execute(
            "DELETE FROM comments WHERE post_id NOT IN (SELECT id FROM posts)",
            [],
        )?;

        tx.commit()?;
        Ok(stats)
    }

    fn all_posts(&self) -> Result<Vec<Post>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM posts")?;
        let rows = stmt
            .query_map([], row_to_post)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(post_from_tuple).collect()
    }

    fn all_likes(&self) -> Result<Vec<Like>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM likes")?;
        let rows = stmt
            .query_map([], row_to_like)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(like_from_tuple).collect()
    }

    fn all_comments(&self) -> Result<Vec<Comment>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM comments")?;
        let rows = stmt
            .query_map([], row_to_comment)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(comment_from_tuple).collect()
    }
}
