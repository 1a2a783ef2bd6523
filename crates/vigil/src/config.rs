//! Startup configuration and registry assembly.
//!
//! Every knob is a CLI flag with a `VIGIL_*` environment fallback, so
//! near-duplicate deployments (different intervals, TTLs, and allowed
//! windows) are configuration values, not code paths.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use vigil_scheduler::{
    Action, ConfigError, DayRule, HourRange, JobSpec, Registry, SkipPolicy, TimeWindow,
};

use crate::actions::{HealthPing, MarketSweep};

/// Bounded timeout for every outbound HTTP call made by actions and the
/// recorder.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Supervisor for windowed periodic background workers.
#[derive(Debug, Parser)]
#[command(name = "vigil", about = "Keep-alive and data-sweep worker supervisor")]
pub struct Settings {
    /// Outcome recorder ingest endpoint (outcomes are POSTed as JSON)
    #[arg(long, env = "VIGIL_RECORDER_URL")]
    pub recorder_url: String,

    /// Reference timezone for allowed windows (IANA zone id)
    #[arg(long, env = "VIGIL_TIMEZONE", default_value = "Asia/Kolkata")]
    pub timezone: String,

    /// Health-check target URL
    #[arg(long, env = "VIGIL_HEALTH_URL")]
    pub health_url: String,

    /// Health-check interval in seconds
    #[arg(long, env = "VIGIL_HEALTH_INTERVAL", default_value = "900")]
    pub health_interval: u64,

    /// Retention period for health-check outcomes, in seconds
    #[arg(long, env = "VIGIL_HEALTH_TTL", default_value = "3600")]
    pub health_ttl: u64,

    /// Allowed window for the health check, e.g. "9-2" (wraps midnight) or "always"
    #[arg(long, env = "VIGIL_HEALTH_WINDOW", default_value = "9-2")]
    pub health_window: String,

    /// Record Skipped outcomes for out-of-window due ticks instead of only logging them
    #[arg(long, env = "VIGIL_RECORD_SKIPS")]
    pub record_skips: bool,

    /// Base URL for sweep quote pages
    #[arg(
        long,
        env = "VIGIL_SWEEP_BASE_URL",
        default_value = "https://www.screener.in"
    )]
    pub sweep_base_url: String,

    /// JSON file holding an array of ticker symbols; the sweep job is
    /// registered only when this is set
    #[arg(long, env = "VIGIL_SWEEP_TARGETS")]
    pub sweep_targets: Option<PathBuf>,

    /// Sweep interval in seconds
    #[arg(long, env = "VIGIL_SWEEP_INTERVAL", default_value = "900")]
    pub sweep_interval: u64,

    /// Retention period for sweep outcomes, in seconds
    #[arg(long, env = "VIGIL_SWEEP_TTL", default_value = "43200")]
    pub sweep_ttl: u64,

    /// Allowed window for the sweep (weekdays only)
    #[arg(long, env = "VIGIL_SWEEP_WINDOW", default_value = "9-17")]
    pub sweep_window: String,

    /// Grace period in seconds before force-terminating workers on shutdown
    #[arg(long, env = "VIGIL_GRACE_TIMEOUT", default_value = "5")]
    pub grace_timeout: u64,

    /// Scheduler polling tick in seconds
    #[arg(long, env = "VIGIL_TICK", default_value = "1")]
    pub tick: u64,

    /// Persist the process run counter to this file (opt-in)
    #[arg(long, env = "VIGIL_RUN_COUNT_FILE")]
    pub run_count_file: Option<PathBuf>,
}

/// Fatal startup faults. These halt the process before any worker spawns.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read sweep targets file {path}: {source}")]
    TargetsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid sweep targets file {path}: {source}")]
    TargetsParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
}

/// Shared HTTP client with the bounded per-request timeout.
pub fn http_client() -> Result<reqwest::Client, SetupError> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(SetupError::HttpClient)
}

/// Assemble the job registry from settings.
pub fn build_registry(
    settings: &Settings,
    client: &reqwest::Client,
) -> Result<Registry, SetupError> {
    let skip_policy = if settings.record_skips {
        SkipPolicy::Record
    } else {
        SkipPolicy::LogOnly
    };

    let mut registry = Registry::new();

    let health_window = TimeWindow::new(
        &settings.timezone,
        settings.health_window.parse()?,
        DayRule::EveryDay,
    )?;
    let ping = JobSpec::new(
        "api-health",
        chrono::Duration::seconds(settings.health_interval as i64),
        chrono::Duration::seconds(settings.health_ttl as i64),
        health_window,
        Arc::new(HealthPing::new(
            client.clone(),
            settings.health_url.clone(),
        )) as Arc<dyn Action>,
    )
    .with_skip_policy(skip_policy);
    registry.register(ping)?;

    if let Some(path) = &settings.sweep_targets {
        let tickers = load_targets(path)?;
        let sweep_window = TimeWindow::new(
            &settings.timezone,
            settings.sweep_window.parse()?,
            DayRule::Weekdays,
        )?;
        let sweep = JobSpec::new(
            "stock-sweep",
            chrono::Duration::seconds(settings.sweep_interval as i64),
            chrono::Duration::seconds(settings.sweep_ttl as i64),
            sweep_window,
            Arc::new(MarketSweep::new(
                client.clone(),
                settings.sweep_base_url.clone(),
                tickers,
            )) as Arc<dyn Action>,
        )
        .with_skip_policy(skip_policy);
        registry.register(sweep)?;
    }

    Ok(registry)
}

fn load_targets(path: &Path) -> Result<Vec<String>, SetupError> {
    let raw = fs::read_to_string(path).map_err(|source| SetupError::TargetsRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SetupError::TargetsParse {
        path: path.to_path_buf(),
        source,
    })
}
