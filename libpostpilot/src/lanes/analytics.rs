//! Analytics lane: keep metrics of published posts fresh

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::Database;
use crate::error::{PlatformError, PostpilotError, Result};
use crate::platform::PlatformClient;
use crate::types::{MetricsSnapshot, Post};

#[derive(Clone)]
pub struct AnalyticsLane {
    db: Database,
    platform: Arc<dyn PlatformClient>,
    /// Seconds after which a snapshot counts as stale.
    freshness_window: i64,
}

impl AnalyticsLane {
    pub fn new(db: Database, platform: Arc<dyn PlatformClient>, freshness_window: i64) -> Self {
        Self {
            db,
            platform,
            freshness_window,
        }
    }

    /// Re-poll every published post whose metrics have gone stale.
    pub async fn tick(&self) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let stale = self
            .db
            .stale_published_posts(now, self.freshness_window)
            .await?;

        if stale.is_empty() {
            return Ok(());
        }

        info!("Fetching metrics for {} post(s)", stale.len());

        for post in &stale {
            if let Err(e) = self.refresh_one(post).await {
                // freshness timestamp untouched, so the post is selected
                // again next run
                error!("Metrics update for post {} failed: {}", post.id, e);
            }
        }

        Ok(())
    }

    async fn refresh_one(&self, post: &Post) -> Result<()> {
        let Some(external_post_id) = post.external_post_id.as_deref() else {
            return Ok(());
        };

        let account = self
            .db
            .account_for_owner(&post.owner_id)
            .await?
            .ok_or_else(|| {
                PlatformError::Authentication(format!("no account for owner {}", post.owner_id))
            })?;

        match self.platform.fetch_metrics(external_post_id, &account).await {
            Ok(metrics) => {
                let snapshot = MetricsSnapshot {
                    post_id: post.id.clone(),
                    impressions: metrics.impressions,
                    reactions: metrics.reactions,
                    comments: metrics.comments,
                    captured_at: chrono::Utc::now().timestamp(),
                };
                self.db.replace_metrics(&snapshot).await?;
                info!("Stored fresh metrics for post {}", post.id);
                Ok(())
            }
            Err(PostpilotError::Platform(PlatformError::NotFound(_))) => {
                warn!(
                    "Post {} no longer exists on the platform, marking deleted",
                    post.id
                );
                self.db.mark_deleted(&post.id).await
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockPlatform;
    use crate::types::{Account, PostMetrics, PostStatus};

    async fn test_db() -> Database {
        Database::new(":memory:").await.unwrap()
    }

    fn account(owner: &str) -> Account {
        Account {
            owner_id: owner.to_string(),
            external_account_id: format!("urn:li:person:{}", owner),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_expires_at: i64::MAX,
        }
    }

    async fn seed_published_post(
        db: &Database,
        owner: &str,
        external_id: &str,
        analytics_age: Option<i64>,
    ) -> Post {
        let now = chrono::Utc::now().timestamp();
        let mut post = Post::new(owner.to_string(), "Published content".to_string(), now);
        post.status = PostStatus::Published;
        post.external_post_id = Some(external_id.to_string());
        post.published_at = Some(now - 7200);
        post.analytics_last_updated_at = analytics_age.map(|age| now - age);
        db.create_post(&post).await.unwrap();
        post
    }

    #[tokio::test]
    async fn test_stale_post_gets_exactly_one_snapshot() {
        let db = test_db().await;
        db.upsert_account(&account("owner-1")).await.unwrap();
        let post = seed_published_post(&db, "owner-1", "X9", Some(7200)).await;

        let platform = Arc::new(MockPlatform::metrics_success(PostMetrics {
            impressions: 10,
            reactions: 2,
            comments: 1,
        }));
        let lane = AnalyticsLane::new(db.clone(), platform.clone(), 3600);
        lane.tick().await.unwrap();

        let snapshot = db.metrics_for_post(&post.id).await.unwrap().unwrap();
        assert_eq!(snapshot.impressions, 10);
        assert_eq!(snapshot.reactions, 2);
        assert_eq!(snapshot.comments, 1);
        assert_eq!(platform.metrics_queries(), vec!["X9".to_string()]);

        let stored = db.get_post(&post.id).await.unwrap().unwrap();
        assert!(stored.analytics_last_updated_at.is_some());
    }

    #[tokio::test]
    async fn test_second_fetch_replaces_the_snapshot() {
        let db = test_db().await;
        db.upsert_account(&account("owner-1")).await.unwrap();
        let post = seed_published_post(&db, "owner-1", "X9", None).await;

        let first = Arc::new(MockPlatform::metrics_success(PostMetrics {
            impressions: 5,
            reactions: 1,
            comments: 0,
        }));
        AnalyticsLane::new(db.clone(), first, 3600).tick().await.unwrap();

        // force staleness again, then fetch different values
        db.replace_metrics(&MetricsSnapshot {
            post_id: post.id.clone(),
            impressions: 5,
            reactions: 1,
            comments: 0,
            captured_at: 1_000,
        })
        .await
        .unwrap();

        let second = Arc::new(MockPlatform::metrics_success(PostMetrics {
            impressions: 42,
            reactions: 7,
            comments: 3,
        }));
        AnalyticsLane::new(db.clone(), second, 3600).tick().await.unwrap();

        let snapshot = db.metrics_for_post(&post.id).await.unwrap().unwrap();
        assert_eq!(snapshot.impressions, 42);
        assert_eq!(snapshot.reactions, 7);
        assert_eq!(snapshot.comments, 3);
    }

    #[tokio::test]
    async fn test_fresh_post_is_not_polled() {
        let db = test_db().await;
        db.upsert_account(&account("owner-1")).await.unwrap();
        seed_published_post(&db, "owner-1", "X9", Some(60)).await;

        let platform = Arc::new(MockPlatform::metrics_success(PostMetrics {
            impressions: 1,
            reactions: 0,
            comments: 0,
        }));
        AnalyticsLane::new(db, platform.clone(), 3600).tick().await.unwrap();

        assert!(platform.metrics_queries().is_empty());
    }

    #[tokio::test]
    async fn test_not_found_marks_post_deleted_without_snapshot() {
        let db = test_db().await;
        db.upsert_account(&account("owner-1")).await.unwrap();
        let post = seed_published_post(&db, "owner-1", "X9", None).await;

        let lane = AnalyticsLane::new(db.clone(), Arc::new(MockPlatform::metrics_not_found()), 3600);
        lane.tick().await.unwrap();

        let stored = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Deleted);
        assert!(db.metrics_for_post(&post.id).await.unwrap().is_none());

        // deleted is absorbing: the next tick no longer selects it
        lane.tick().await.unwrap();
        let stored = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Deleted);
    }

    #[tokio::test]
    async fn test_other_error_leaves_post_eligible_for_retry() {
        let db = test_db().await;
        db.upsert_account(&account("owner-1")).await.unwrap();
        let post = seed_published_post(&db, "owner-1", "X9", None).await;

        let failing = Arc::new(MockPlatform::metrics_failure(PlatformError::Network(
            "connection reset".to_string(),
        )));
        AnalyticsLane::new(db.clone(), failing, 3600).tick().await.unwrap();

        let stored = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Published);
        assert_eq!(stored.analytics_last_updated_at, None);
        assert!(db.metrics_for_post(&post.id).await.unwrap().is_none());

        // the next run with a healthy platform picks it up again
        let healthy = Arc::new(MockPlatform::metrics_success(PostMetrics {
            impressions: 3,
            reactions: 1,
            comments: 0,
        }));
        AnalyticsLane::new(db.clone(), healthy, 3600).tick().await.unwrap();
        assert!(db.metrics_for_post(&post.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_one_missing_account_does_not_abort_the_batch() {
        let db = test_db().await;
        db.upsert_account(&account("owner-ok")).await.unwrap();
        let good = seed_published_post(&db, "owner-ok", "X1", None).await;
        let orphan = seed_published_post(&db, "owner-gone", "X2", None).await;

        let platform = Arc::new(MockPlatform::metrics_success(PostMetrics {
            impressions: 8,
            reactions: 2,
            comments: 2,
        }));
        AnalyticsLane::new(db.clone(), platform, 3600).tick().await.unwrap();

        assert!(db.metrics_for_post(&good.id).await.unwrap().is_some());
        assert!(db.metrics_for_post(&orphan.id).await.unwrap().is_none());
        // the orphan stays published and retryable
        let stored = db.get_post(&orphan.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Published);
    }
}
