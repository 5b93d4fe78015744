//! postpilot-engine - Background engine for scheduled publishing
//!
//! Claims due posts and publishes them, keeps metrics of published posts
//! fresh, and rotates delegated platform credentials before expiry.

use clap::Parser;
use libpostpilot::logging::{LogFormat, LoggingConfig};
use libpostpilot::platform::rest::RestPlatformClient;
use libpostpilot::{Config, Database, Result, Scheduler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "postpilot-engine")]
#[command(version)]
#[command(about = "Background engine for scheduled publishing")]
#[command(long_about = "\
postpilot-engine - Background engine for scheduled publishing

DESCRIPTION:
    postpilot-engine is a long-running daemon with three independent lanes:

    publish    claims posts whose scheduled time has passed and submits
               them to the platform (default: every 60 seconds)
    analytics  re-polls engagement metrics of published posts once their
               snapshot goes stale (default: every 60 seconds)
    renewal    refreshes platform credentials expiring within the horizon
               (default: daily at 03:00 UTC, 7-day horizon)

    Lanes fail independently: an error in one tick is logged and the next
    tick runs as usual. Several engine processes may share one database;
    the claim step guarantees each due post is published exactly once.

USAGE:
    # Run in foreground (logs to stderr)
    postpilot-engine

    # Run each lane a single time, then exit
    postpilot-engine --once

    # Shorter publish cadence
    postpilot-engine --publish-interval 15

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current tick)

CONFIGURATION:
    Configuration file: ~/.config/postpilot/config.toml
    Database location:  ~/.local/share/postpilot/postpilot.db

    Override with environment variables:
        POSTPILOT_CONFIG      - Path to config file
        POSTPILOT_LOG_FORMAT  - text, json or pretty
        POSTPILOT_LOG_LEVEL   - error, warn, info, debug, trace

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration or authentication error
    3 - Invalid input
")]
struct Cli {
    /// Seconds between publish ticks (overrides config)
    #[arg(long, value_name = "SECONDS")]
    publish_interval: Option<u64>,

    /// Seconds between analytics ticks (overrides config)
    #[arg(long, value_name = "SECONDS")]
    analytics_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Run every lane once and exit (for testing)
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(interval) = cli.publish_interval {
        config.scheduling.publish_interval = interval;
    }
    if let Some(interval) = cli.analytics_interval {
        config.scheduling.analytics_interval = interval;
    }

    let db = Database::new(&config.database.path).await?;
    let platform = Arc::new(RestPlatformClient::from_config(&config.platform)?);

    info!("postpilot-engine starting");

    let scheduler = Scheduler::new(db, platform, config.scheduling.clone());

    if cli.once {
        scheduler.run_once().await;
        info!("postpilot-engine: ran each lane once, exiting");
    } else {
        let shutdown = Arc::new(AtomicBool::new(false));
        setup_signal_handlers(shutdown.clone())?;
        scheduler.run(shutdown).await;
    }

    info!("postpilot-engine stopped");
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    if verbose {
        let format = std::env::var("POSTPILOT_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(LogFormat::Text);
        LoggingConfig::new(format, "debug".to_string(), true).init();
    } else {
        libpostpilot::logging::init_default();
    }
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libpostpilot::PostpilotError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}
