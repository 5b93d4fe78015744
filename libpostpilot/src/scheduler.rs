//! Lane orchestration on independent cadences
//!
//! Publish and analytics run on short fixed intervals; renewal runs once a
//! day at a fixed UTC hour. Each lane lives in its own task with its own
//! failure boundary, so a failing tick never disturbs the other lanes or
//! later ticks of the same lane. Multiple engine processes may run the
//! same lanes concurrently; correctness comes from the claim engine, not
//! from anything in here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use crate::config::SchedulingConfig;
use crate::db::Database;
use crate::lanes::{AnalyticsLane, PublishLane, RenewalLane};
use crate::platform::PlatformClient;

pub struct Scheduler {
    publish: PublishLane,
    analytics: AnalyticsLane,
    renewal: RenewalLane,
    config: SchedulingConfig,
}

impl Scheduler {
    pub fn new(db: Database, platform: Arc<dyn PlatformClient>, config: SchedulingConfig) -> Self {
        Self {
            publish: PublishLane::new(db.clone(), platform.clone()),
            analytics: AnalyticsLane::new(db.clone(), platform.clone(), config.metrics_freshness),
            renewal: RenewalLane::new(db, platform, config.renewal_horizon_days),
            config,
        }
    }

    /// Run every lane exactly once, swallowing per-lane errors.
    /// Backs the daemon's `--once` mode.
    pub async fn run_once(&self) {
        if let Err(e) = self.publish.tick().await {
            error!("Publish tick failed: {}", e);
        }
        if let Err(e) = self.analytics.tick().await {
            error!("Analytics tick failed: {}", e);
        }
        if let Err(e) = self.renewal.tick().await {
            error!("Renewal tick failed: {}", e);
        }
    }

    /// Drive the three lanes until `shutdown` is set.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) {
        info!(
            "Scheduler starting (publish every {}s, analytics every {}s, renewal daily at {:02}:00 UTC)",
            self.config.publish_interval, self.config.analytics_interval, self.config.renewal_hour
        );

        let publish = self.publish.clone();
        let publish_interval = self.config.publish_interval;
        let publish_shutdown = shutdown.clone();
        let publish_task = tokio::spawn(async move {
            while !publish_shutdown.load(Ordering::Relaxed) {
                if let Err(e) = publish.tick().await {
                    error!("Publish tick failed: {}", e);
                }
                sleep_with_shutdown(publish_interval, &publish_shutdown).await;
            }
        });

        let analytics = self.analytics.clone();
        let analytics_interval = self.config.analytics_interval;
        let analytics_shutdown = shutdown.clone();
        let analytics_task = tokio::spawn(async move {
            while !analytics_shutdown.load(Ordering::Relaxed) {
                if let Err(e) = analytics.tick().await {
                    error!("Analytics tick failed: {}", e);
                }
                sleep_with_shutdown(analytics_interval, &analytics_shutdown).await;
            }
        });

        let renewal = self.renewal.clone();
        let renewal_hour = self.config.renewal_hour;
        let renewal_shutdown = shutdown.clone();
        let renewal_task = tokio::spawn(async move {
            while !renewal_shutdown.load(Ordering::Relaxed) {
                let wait = seconds_until_hour(chrono::Utc::now().timestamp(), renewal_hour);
                sleep_with_shutdown(wait, &renewal_shutdown).await;
                if renewal_shutdown.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(e) = renewal.tick().await {
                    error!("Renewal tick failed: {}", e);
                }
            }
        });

        let _ = futures::future::join_all([publish_task, analytics_task, renewal_task]).await;
        info!("Scheduler stopped");
    }
}

/// Sleep in one-second slices so a shutdown request is honored promptly.
async fn sleep_with_shutdown(seconds: u64, shutdown: &AtomicBool) {
    for _ in 0..seconds {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        sleep(Duration::from_secs(1)).await;
    }
}

/// Seconds until the next occurrence of `hour`:00:00 UTC.
fn seconds_until_hour(now: i64, hour: u32) -> u64 {
    const DAY: i64 = 86_400;
    let today_start = now - now.rem_euclid(DAY);
    let mut anchor = today_start + i64::from(hour) * 3600;
    if anchor <= now {
        anchor += DAY;
    }
    (anchor - now) as u64
}
