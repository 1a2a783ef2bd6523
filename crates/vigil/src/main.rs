//! Vigil: supervisor for windowed periodic background workers.
//!
//! Wires the job registry to the supervisor, installs termination-signal
//! handling, and drives a bounded-time shutdown. The process exits 0 on any
//! signal-initiated shutdown, including one that required forced worker
//! termination; only configuration faults at startup are fatal.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use miette::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_scheduler::{Recorder, Supervisor};

mod actions;
mod config;
mod recorder;
mod runcount;

use config::Settings;
use recorder::HttpRecorder;
use runcount::RunCounter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "vigil=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::parse();

    let run_counter = RunCounter::new(settings.run_count_file.clone());
    let run = run_counter.next();
    info!(run, "starting vigil supervisor");

    let client = config::http_client().map_err(|e| miette::miette!("{}", e))?;
    let recorder: Arc<dyn Recorder> = Arc::new(HttpRecorder::new(
        client.clone(),
        settings.recorder_url.clone(),
    ));

    let registry =
        config::build_registry(&settings, &client).map_err(|e| miette::miette!("{}", e))?;
    info!(jobs = ?registry.job_names(), "registry assembled");

    let mut supervisor = Supervisor::start_with_tick(
        registry,
        recorder,
        Some(Duration::from_secs(settings.tick)),
    )
    .map_err(|e| miette::miette!("{}", e))?;

    shutdown_signal().await;
    info!("termination signal received");

    supervisor
        .shutdown(Duration::from_secs(settings.grace_timeout))
        .await;
    run_counter.clear();

    info!("vigil supervisor stopped");
    Ok(())
}

/// Resolve when the process receives SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
