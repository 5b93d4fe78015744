//! Database operations for Postpilot

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::error::Result;
use crate::types::{Account, MetricsSnapshot, Post, PostStatus};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection and run pending migrations.
    ///
    /// `":memory:"` opens a private in-memory database (single connection,
    /// used by tests); anything else is treated as a file path, created
    /// along with its parent directories if missing.
    pub async fn new(db_path: &str) -> Result<Self> {
        let pool = if db_path == ":memory:" {
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .map_err(crate::error::DbError::SqlxError)?
        } else {
            let expanded_path = shellexpand::tilde(db_path).to_string();
            let path = Path::new(&expanded_path);

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(crate::error::DbError::IoError)?;
            }

            // Forward slashes keep the URL valid on Windows too; mode=rwc
            // creates the file on first run.
            let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

            SqlitePool::connect(&db_url)
                .await
                .map_err(crate::error::DbError::SqlxError)?
        };

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(crate::error::DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Insert a new post row. Rows normally arrive through the CRUD
    /// surface; the engine itself only calls this from tests.
    pub async fn create_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, owner_id, content_text, created_at, scheduled_at, status,
                               external_post_id, published_at, analytics_last_updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.owner_id)
        .bind(&post.content_text)
        .bind(post.created_at)
        .bind(post.scheduled_at)
        .bind(post.status.as_str())
        .bind(&post.external_post_id)
        .bind(post.published_at)
        .bind(post.analytics_last_updated_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, content_text, created_at, scheduled_at, status,
                   external_post_id, published_at, analytics_last_updated_at
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(row.map(|r| post_from_row(&r)))
    }

    /// Atomically claim every due post.
    ///
    /// The conditional UPDATE is the skip-locked equivalent on SQLite:
    /// writers are serialized, so of two concurrent claimants only one can
    /// flip a given row out of `scheduled`, and the other's statement no
    /// longer matches it. The claim sets partition the due set. The whole
    /// batch commits or rolls back together, so a storage error leaves no
    /// partial claims and the same posts stay eligible next tick.
    pub async fn claim_due_posts(&self, now: i64) -> Result<Vec<Post>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        let rows = sqlx::query(
            r#"
            UPDATE posts
            SET status = 'publishing'
            WHERE status = 'scheduled' AND scheduled_at <= ?
            RETURNING id, owner_id, content_text, created_at, scheduled_at, status,
                      external_post_id, published_at, analytics_last_updated_at
            "#,
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        tx.commit()
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    /// Finalize a claimed post as published.
    ///
    /// `external_post_id` is None only on the duplicate-content path when
    /// the platform's existing reference could not be recovered.
    pub async fn mark_published(
        &self,
        post_id: &str,
        external_post_id: Option<&str>,
        published_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts SET status = 'published', external_post_id = ?, published_at = ?
            WHERE id = ?
            "#,
        )
        .bind(external_post_id)
        .bind(published_at)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Finalize a claimed post as failed. Terminal: the engine never
    /// retries a failed publication.
    pub async fn mark_failed(&self, post_id: &str) -> Result<()> {
        self.set_status(post_id, PostStatus::Failed).await
    }

    /// Mark a published post whose remote content disappeared.
    pub async fn mark_deleted(&self, post_id: &str) -> Result<()> {
        self.set_status(post_id, PostStatus::Deleted).await
    }

    async fn set_status(&self, post_id: &str, status: PostStatus) -> Result<()> {
        sqlx::query("UPDATE posts SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Published posts whose metrics were never fetched or have gone stale.
    pub async fn stale_published_posts(
        &self,
        now: i64,
        freshness_window: i64,
    ) -> Result<Vec<Post>> {
        let cutoff = now - freshness_window;

        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, content_text, created_at, scheduled_at, status,
                   external_post_id, published_at, analytics_last_updated_at
            FROM posts
            WHERE status = 'published'
              AND external_post_id IS NOT NULL
              AND (analytics_last_updated_at IS NULL OR analytics_last_updated_at < ?)
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    /// Replace the post's metrics snapshot and advance its freshness
    /// timestamp, all in one transaction.
    pub async fn replace_metrics(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        sqlx::query("DELETE FROM metrics_snapshots WHERE post_id = ?")
            .bind(&snapshot.post_id)
            .execute(&mut *tx)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        sqlx::query(
            r#"
            INSERT INTO metrics_snapshots (post_id, impressions, reactions, comments, captured_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snapshot.post_id)
        .bind(snapshot.impressions)
        .bind(snapshot.reactions)
        .bind(snapshot.comments)
        .bind(snapshot.captured_at)
        .execute(&mut *tx)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        sqlx::query("UPDATE posts SET analytics_last_updated_at = ? WHERE id = ?")
            .bind(snapshot.captured_at)
            .bind(&snapshot.post_id)
            .execute(&mut *tx)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        tx.commit()
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Get the current metrics snapshot for a post, if any.
    pub async fn metrics_for_post(&self, post_id: &str) -> Result<Option<MetricsSnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT post_id, impressions, reactions, comments, captured_at
            FROM metrics_snapshots WHERE post_id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(row.map(|r| MetricsSnapshot {
            post_id: r.get("post_id"),
            impressions: r.get("impressions"),
            reactions: r.get("reactions"),
            comments: r.get("comments"),
            captured_at: r.get("captured_at"),
        }))
    }

    /// Insert or overwrite an owner's credential record.
    pub async fn upsert_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (owner_id, external_account_id, access_token, refresh_token, token_expires_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (owner_id) DO UPDATE SET
                external_account_id = excluded.external_account_id,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                token_expires_at = excluded.token_expires_at
            "#,
        )
        .bind(&account.owner_id)
        .bind(&account.external_account_id)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.token_expires_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Get the credential record for a post owner
    pub async fn account_for_owner(&self, owner_id: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT owner_id, external_account_id, access_token, refresh_token, token_expires_at
            FROM accounts WHERE owner_id = ?
            "#,
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(row.map(|r| account_from_row(&r)))
    }

    /// Accounts whose access token expires before `deadline`.
    pub async fn expiring_accounts(&self, deadline: i64) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT owner_id, external_account_id, access_token, refresh_token, token_expires_at
            FROM accounts WHERE token_expires_at < ?
            "#,
        )
        .bind(deadline)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(rows.iter().map(account_from_row).collect())
    }

    /// Store a freshly rotated token pair.
    pub async fn update_account_tokens(
        &self,
        owner_id: &str,
        access_token: &str,
        refresh_token: &str,
        token_expires_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET access_token = ?, refresh_token = ?, token_expires_at = ?
            WHERE owner_id = ?
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(token_expires_at)
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }
}

fn post_from_row(r: &SqliteRow) -> Post {
    Post {
        id: r.get("id"),
        owner_id: r.get("owner_id"),
        content_text: r.get("content_text"),
        created_at: r.get("created_at"),
        scheduled_at: r.get("scheduled_at"),
        status: PostStatus::from_str(&r.get::<String, _>("status")),
        external_post_id: r.get("external_post_id"),
        published_at: r.get("published_at"),
        analytics_last_updated_at: r.get("analytics_last_updated_at"),
    }
}

fn account_from_row(r: &SqliteRow) -> Account {
    Account {
        owner_id: r.get("owner_id"),
        external_account_id: r.get("external_account_id"),
        access_token: r.get("access_token"),
        refresh_token: r.get("refresh_token"),
        token_expires_at: r.get("token_expires_at"),
    }
}
