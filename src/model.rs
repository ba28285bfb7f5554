//! Local data model: posts, likes, comments, and the sync watermark singleton.
//!
//! Mirrors §3.1 of the spec. Every entity carries a client-generated,
//! immutable [`RecordId`] that is also the remote primary key — re-sending a
//! record is always an upsert, never an insert-or-fail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 128-bit opaque identifier, hex-encodable, minted client-side.
///
/// Wraps a [`uuid::Uuid`] rather than a bare `String` so malformed ids are
/// caught at construction instead of propagating into SQL/wire payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(uuid::Uuid);

impl RecordId {
    /// Mint a new client-generated id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_hex(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }

    pub fn as_hex(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

/// `media_type` discriminant for a [`Post`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: RecordId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub media_type: MediaType,
    pub local_uri: Option<String>,
    pub remote_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub user_email: String,
    pub is_synced: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Snapshot of `text`/`remote_url` as of the last time this record was
    /// known to match the server (push ack, or a pull insert/overwrite).
    /// Local-only bookkeeping, never sent over the wire: it is what lets
    /// the pull field-level merge (§4.E.3) tell "remote changed" apart from
    /// "local changed" without a full CRDT.
    #[serde(default)]
    pub synced_text: Option<String>,
    #[serde(default)]
    pub synced_remote_url: Option<String>,
}

impl Post {
    /// True once media has been uploaded and `remote_url` recorded (§4.D.1).
    pub fn media_uploaded(&self) -> bool {
        self.remote_url.is_some()
    }

    /// True when this post still needs an upload attempt before its
    /// metadata can be pushed (§4.D.1 step 1).
    pub fn needs_media_upload(&self) -> bool {
        self.local_uri.is_some() && self.remote_url.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Like {
    pub id: RecordId,
    pub post_id: RecordId,
    pub user_email: String,
    pub is_synced: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: RecordId,
    pub post_id: RecordId,
    pub user_email: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub is_synced: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// See [`Post::synced_text`].
    #[serde(default)]
    pub synced_text: Option<String>,
}

/// Singleton row holding the pull watermark (§3.1, §4.E).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSettings {
    pub id: RecordId,
    pub last_sync_time: DateTime<Utc>,
}

impl SystemSettings {
    /// A freshly-created singleton starts at the epoch (§4.E.1).
    pub fn fresh(id: RecordId) -> Self {
        Self {
            id,
            last_sync_time: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Toggle a [`Like`]: soft-delete if active, resurrect if tombstoned.
///
/// Implements §4.D.2's resurrect path and invariant 6 (at most one active
/// like per post/user pair) without ever minting a second row for the same
/// toggle target.
pub fn toggle_like(like: &mut Like, now: DateTime<Utc>) {
    like.deleted_at = if like.deleted_at.is_some() {
        None
    } else {
        Some(now)
    };
    like.is_synced = false;
}
