//! Publish lane: claim due posts and push them to the platform

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::Database;
use crate::error::{PlatformError, PostpilotError, Result};
use crate::platform::PlatformClient;
use crate::types::Post;

#[derive(Clone)]
pub struct PublishLane {
    db: Database,
    platform: Arc<dyn PlatformClient>,
}

impl PublishLane {
    pub fn new(db: Database, platform: Arc<dyn PlatformClient>) -> Self {
        Self { db, platform }
    }

    /// Claim every due post and drain the batch.
    ///
    /// The claim itself is all-or-nothing; afterwards each post is handled
    /// in its own failure boundary so one bad item cannot abort the rest.
    pub async fn tick(&self) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let batch = self.db.claim_due_posts(now).await?;

        if batch.is_empty() {
            return Ok(());
        }

        info!("Claimed {} post(s) for publishing", batch.len());

        for post in &batch {
            if let Err(e) = self.publish_one(post).await {
                error!("Failed to record outcome for post {}: {}", post.id, e);
            }
        }

        Ok(())
    }

    async fn publish_one(&self, post: &Post) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        match self.submit(post).await {
            Ok(external_id) => {
                info!("Post {} published as {}", post.id, external_id);
                self.db
                    .mark_published(&post.id, Some(&external_id), now)
                    .await
            }
            Err(PostpilotError::Platform(PlatformError::Duplicate { existing_ref })) => {
                // The platform-side write already happened on an earlier
                // attempt; recording it prevents a future re-submission.
                warn!(
                    "Post {} already exists on the platform (ref: {:?}), marking published",
                    post.id, existing_ref
                );
                self.db
                    .mark_published(&post.id, existing_ref.as_deref(), now)
                    .await
            }
            Err(e) => {
                warn!("Publishing post {} failed: {}", post.id, e);
                self.db.mark_failed(&post.id).await
            }
        }
    }

    /// Look up credentials and submit. An absent account or unusable token
    /// lands in the same terminal branch as any other platform error.
    async fn submit(&self, post: &Post) -> Result<String> {
        let account = self
            .db
            .account_for_owner(&post.owner_id)
            .await?
            .ok_or_else(|| {
                PlatformError::Authentication(format!("no account for owner {}", post.owner_id))
            })?;

        if account.access_token.is_empty() || account.external_account_id.is_empty() {
            return Err(PlatformError::Authentication(format!(
                "account for owner {} has no usable token or author id",
                post.owner_id
            ))
            .into());
        }

        self.platform.submit(&post.content_text, &account).await
    }
}
