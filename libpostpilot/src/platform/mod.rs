//! Platform client abstraction and implementations
//!
//! The engine talks to the external social platform through one narrow
//! trait. The production implementation is an HTTP client over the
//! platform's versioned REST API; the mock implementation scripts
//! outcomes for tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Account, PostMetrics, RefreshedToken};

pub mod mock;
pub mod rest;

/// Narrow contract with the external platform.
///
/// All three operations are fallible and slow; callers bound them with the
/// client's request timeout and classify failures through
/// [`crate::error::PlatformError`]:
///
/// - `submit` may fail with `Duplicate { existing_ref }`, meaning the
///   platform already accepted identical content. Callers treat this as an
///   idempotent success signal.
/// - `fetch_metrics` may fail with `NotFound`, meaning the remote content
///   no longer exists.
/// - any other variant is an opaque failure; what that means is up to the
///   lane (terminal for publishing, retry-by-doing-nothing for metrics and
///   refresh).
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Submit content under the account's platform identity, returning the
    /// platform's reference for the created post.
    async fn submit(&self, content: &str, account: &Account) -> Result<String>;

    /// Fetch current engagement counters for a published post.
    async fn fetch_metrics(&self, external_post_id: &str, account: &Account)
        -> Result<PostMetrics>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken>;

    /// Lowercase platform identifier, used in logs.
    fn name(&self) -> &str;
}
