//! Renewal lane: rotate platform credentials before they expire

use std::sync::Arc;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::platform::PlatformClient;
use crate::types::Account;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Clone)]
pub struct RenewalLane {
    db: Database,
    platform: Arc<dyn PlatformClient>,
    /// Accounts expiring within this many days get refreshed.
    horizon_days: i64,
}

impl RenewalLane {
    pub fn new(db: Database, platform: Arc<dyn PlatformClient>, horizon_days: i64) -> Self {
        Self {
            db,
            platform,
            horizon_days,
        }
    }

    /// Refresh every account whose token expires within the horizon.
    pub async fn tick(&self) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let deadline = now + self.horizon_days * SECONDS_PER_DAY;
        let accounts = self.db.expiring_accounts(deadline).await?;

        if accounts.is_empty() {
            return Ok(());
        }

        info!("Refreshing tokens for {} account(s)", accounts.len());

        for account in &accounts {
            if let Err(e) = self.refresh_one(account, now).await {
                // expiry unchanged, so the account is selected again next run
                warn!("Token refresh for owner {} failed: {}", account.owner_id, e);
            }
        }

        Ok(())
    }

    async fn refresh_one(&self, account: &Account, now: i64) -> Result<()> {
        let token = self.platform.refresh(&account.refresh_token).await?;

        self.db
            .update_account_tokens(
                &account.owner_id,
                &token.access_token,
                &token.refresh_token,
                now + token.expires_in,
            )
            .await?;

        info!("Refreshed token for owner {}", account.owner_id);
        Ok(())
    }
}
