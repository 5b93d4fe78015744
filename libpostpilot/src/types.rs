//! Core types for Postpilot

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A pre-authored post waiting to be (or already) published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub owner_id: String,
    pub content_text: String,
    pub created_at: i64,
    pub scheduled_at: i64,
    pub status: PostStatus,
    /// Opaque platform reference; None until the post is published.
    pub external_post_id: Option<String>,
    pub published_at: Option<i64>,
    pub analytics_last_updated_at: Option<i64>,
}

impl Post {
    /// Create a new scheduled post owned by `owner_id`.
    pub fn new(owner_id: String, content_text: String, scheduled_at: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id,
            content_text,
            created_at: chrono::Utc::now().timestamp(),
            scheduled_at,
            status: PostStatus::Scheduled,
            external_post_id: None,
            published_at: None,
            analytics_last_updated_at: None,
        }
    }
}

/// Post lifecycle. `Publishing` is a claim marker, never a rest state;
/// `Published`, `Failed` and `Deleted` are terminal for the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PostStatus {
    Scheduled,
    Publishing,
    Published,
    Failed,
    Deleted,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
            PostStatus::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "publishing" => PostStatus::Publishing,
            "published" => PostStatus::Published,
            "failed" => PostStatus::Failed,
            "deleted" => PostStatus::Deleted,
            _ => PostStatus::Scheduled,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delegated platform credentials for one post owner.
///
/// Created and initially populated by the OAuth callback outside this engine;
/// the engine only reads tokens and rotates them near expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub owner_id: String,
    /// Platform-side author identifier (a full URN).
    pub external_account_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires_at: i64,
}

/// Latest engagement numbers for one published post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub post_id: String,
    pub impressions: i64,
    pub reactions: i64,
    pub comments: i64,
    pub captured_at: i64,
}

/// Engagement counters as returned by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetrics {
    pub impressions: i64,
    pub reactions: i64,
    pub comments: i64,
}

/// Result of a successful token refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshedToken {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the new access token, in seconds.
    pub expires_in: i64,
}
