//! Wire shapes for the remote store (§6.2), typed rather than assembled as
//! ad-hoc JSON, analogous to the `OutboundRecord`/`RemoteRecord` split used
//! by similar sync transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Comment, Like, MediaType, Post, RecordId};

#[derive(Debug, Clone, Serialize)]
pub struct PostUpsert {
    pub id: RecordId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub user_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PostUpsert {
    /// Build the push payload for an already-media-resolved post (§4.D.1
    /// steps 2-3 — `remote_url` must be populated by the time this is
    /// called if the post carries local media).
    pub fn from_post(post: &Post) -> Self {
        let (image_url, video_url) = match post.media_type {
            MediaType::Image => (post.remote_url.clone(), None),
            MediaType::Video => (None, post.remote_url.clone()),
        };
        Self {
            id: post.id,
            text: post.text.clone(),
            image_url,
            video_url,
            media_type: post.media_type,
            thumbnail_url: post.thumbnail_url.clone(),
            timestamp: post.timestamp,
            user_email: post.user_email.clone(),
            deleted_at: post.deleted_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeUpsert {
    pub id: RecordId,
    pub post_id: RecordId,
    pub user_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LikeUpsert {
    pub fn from_like(like: &Like) -> Self {
        Self {
            id: like.id,
            post_id: like.post_id,
            user_email: like.user_email.clone(),
            deleted_at: like.deleted_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentUpsert {
    pub id: RecordId,
    pub post_id: RecordId,
    pub user_email: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl CommentUpsert {
    pub fn from_comment(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            user_email: comment.user_email.clone(),
            text: comment.text.clone(),
            created_at: comment.timestamp,
            deleted_at: comment.deleted_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemotePost {
    pub id: RecordId,
    pub text: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub media_type: Option<MediaType>,
    pub thumbnail_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub user_email: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteLike {
    pub id: RecordId,
    pub post_id: RecordId,
    pub user_email: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteComment {
    pub id: RecordId,
    pub post_id: RecordId,
    pub user_email: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
