//! Mock platform client for testing
//!
//! Scripts the outcome of each platform operation so lane logic can be
//! exercised without network access. Available outside `#[cfg(test)]` so
//! integration tests can use it too.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::platform::PlatformClient;
use crate::types::{Account, PostMetrics, RefreshedToken};

/// Scripted outcome of a submit call
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Accept the content and return this reference
    Success(String),
    /// Reject as already-published, optionally with the existing reference
    Duplicate(Option<String>),
    /// Fail with an arbitrary platform error
    Fail(PlatformError),
}

/// Scripted outcome of a metrics fetch
#[derive(Debug, Clone)]
pub enum MetricsOutcome {
    Success(PostMetrics),
    /// The remote content no longer exists
    NotFound,
    Fail(PlatformError),
}

/// Scripted outcome of a token refresh
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Success(RefreshedToken),
    Fail(PlatformError),
}

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub name: String,
    pub submit_outcome: SubmitOutcome,
    pub metrics_outcome: MetricsOutcome,
    pub refresh_outcome: RefreshOutcome,
    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,
    /// Content submitted, in call order
    pub submitted: Arc<Mutex<Vec<String>>>,
    /// External post ids queried for metrics, in call order
    pub metrics_queries: Arc<Mutex<Vec<String>>>,
    /// Refresh tokens presented, in call order
    pub refresh_calls: Arc<Mutex<Vec<String>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            submit_outcome: SubmitOutcome::Success("mock:post".to_string()),
            metrics_outcome: MetricsOutcome::Success(PostMetrics {
                impressions: 0,
                reactions: 0,
                comments: 0,
            }),
            refresh_outcome: RefreshOutcome::Success(RefreshedToken {
                access_token: "mock-access".to_string(),
                refresh_token: "mock-refresh".to_string(),
                expires_in: 3600,
            }),
            delay: Duration::from_millis(0),
            submitted: Arc::new(Mutex::new(Vec::new())),
            metrics_queries: Arc::new(Mutex::new(Vec::new())),
            refresh_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock platform client
pub struct MockPlatform {
    config: MockConfig,
}

impl MockPlatform {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Submit succeeds with the given reference
    pub fn submit_success(external_id: &str) -> Self {
        Self::new(MockConfig {
            submit_outcome: SubmitOutcome::Success(external_id.to_string()),
            ..Default::default()
        })
    }

    /// Submit is rejected as duplicate content
    pub fn submit_duplicate(existing_ref: Option<&str>) -> Self {
        Self::new(MockConfig {
            submit_outcome: SubmitOutcome::Duplicate(existing_ref.map(str::to_string)),
            ..Default::default()
        })
    }

    /// Submit fails with the given error
    pub fn submit_failure(error: PlatformError) -> Self {
        Self::new(MockConfig {
            submit_outcome: SubmitOutcome::Fail(error),
            ..Default::default()
        })
    }

    /// Metrics fetches return the given counters
    pub fn metrics_success(metrics: PostMetrics) -> Self {
        Self::new(MockConfig {
            metrics_outcome: MetricsOutcome::Success(metrics),
            ..Default::default()
        })
    }

    /// Metrics fetches report the content as gone
    pub fn metrics_not_found() -> Self {
        Self::new(MockConfig {
            metrics_outcome: MetricsOutcome::NotFound,
            ..Default::default()
        })
    }

    /// Metrics fetches fail with the given error
    pub fn metrics_failure(error: PlatformError) -> Self {
        Self::new(MockConfig {
            metrics_outcome: MetricsOutcome::Fail(error),
            ..Default::default()
        })
    }

    /// Refreshes return the given token pair
    pub fn refresh_success(access: &str, refresh: &str, expires_in: i64) -> Self {
        Self::new(MockConfig {
            refresh_outcome: RefreshOutcome::Success(RefreshedToken {
                access_token: access.to_string(),
                refresh_token: refresh.to_string(),
                expires_in,
            }),
            ..Default::default()
        })
    }

    /// Refreshes fail with the given error
    pub fn refresh_failure(error: PlatformError) -> Self {
        Self::new(MockConfig {
            refresh_outcome: RefreshOutcome::Fail(error),
            ..Default::default()
        })
    }

    pub fn submitted(&self) -> Vec<String> {
        self.config.submitted.lock().unwrap().clone()
    }

    pub fn metrics_queries(&self) -> Vec<String> {
        self.config.metrics_queries.lock().unwrap().clone()
    }

    pub fn refresh_calls(&self) -> Vec<String> {
        self.config.refresh_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn submit(&self, content: &str, _account: &Account) -> Result<String> {
        self.config.submitted.lock().unwrap().push(content.to_string());

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        match &self.config.submit_outcome {
            SubmitOutcome::Success(id) => Ok(id.clone()),
            SubmitOutcome::Duplicate(existing_ref) => Err(PlatformError::Duplicate {
                existing_ref: existing_ref.clone(),
            }
            .into()),
            SubmitOutcome::Fail(error) => Err(error.clone().into()),
        }
    }

    async fn fetch_metrics(
        &self,
        external_post_id: &str,
        _account: &Account,
    ) -> Result<PostMetrics> {
        self.config
            .metrics_queries
            .lock()
            .unwrap()
            .push(external_post_id.to_string());

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        match &self.config.metrics_outcome {
            MetricsOutcome::Success(metrics) => Ok(*metrics),
            MetricsOutcome::NotFound => {
                Err(PlatformError::NotFound(external_post_id.to_string()).into())
            }
            MetricsOutcome::Fail(error) => Err(error.clone().into()),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken> {
        self.config
            .refresh_calls
            .lock()
            .unwrap()
            .push(refresh_token.to_string());

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        match &self.config.refresh_outcome {
            RefreshOutcome::Success(token) => Ok(token.clone()),
            RefreshOutcome::Fail(error) => Err(error.clone().into()),
        }
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}
