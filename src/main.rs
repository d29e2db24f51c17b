//! Background worker daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌───────────────────────────── workerd ─────────────────────────────┐
//!   │                                                                   │
//!   │   admin API (axum) ──▶ WorkerManager ──┬──▶ AuditWorker ──▶ sink  │
//!   │        │                               ├──▶ HealthMonitorWorker   │
//!   │        └── record_calls ──▶ registry ◀─┘                          │
//!   │                                        └──▶ CleanupWorker ──▶ fs  │
//!   │                                                                   │
//!   │   SIGINT / SIGTERM ──▶ graceful admin shutdown ──▶ stop(deadline) │
//!   └───────────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use background_workers::admin::{setup_admin_router, AdminState};
use background_workers::config::{load_config, WorkerConfig};
use background_workers::lifecycle::signals::wait_for_termination;
use background_workers::observability::{logging, metrics};
use background_workers::sinks::{AuditSink, JsonLinesSink, TracingSink};
use background_workers::sweepers::{FileRetentionSweeper, Sweeper};
use background_workers::workers::{WorkerError, WorkerManager};

#[derive(Parser)]
#[command(name = "workerd")]
#[command(about = "Audit, health monitoring and cleanup workers", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => WorkerConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "workerd starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let sink: Arc<dyn AuditSink> = match &config.audit.sink_path {
        Some(path) => Arc::new(JsonLinesSink::new(path)),
        None => Arc::new(TracingSink),
    };
    let sweepers: Vec<Arc<dyn Sweeper>> = config
        .cleanup
        .retention
        .iter()
        .map(|rule| Arc::new(FileRetentionSweeper::from(rule)) as Arc<dyn Sweeper>)
        .collect();

    let manager = Arc::new(WorkerManager::new(&config, sink, sweepers)?);
    manager.start()?;

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let router = setup_admin_router(AdminState::new(
            manager.clone(),
            config.admin.api_key.clone(),
        ));
        axum::serve(listener, router)
            .with_graceful_shutdown(wait_for_termination())
            .await?;
    } else {
        wait_for_termination().await;
    }

    tracing::info!("Shutdown signal received, stopping workers");
    match manager.stop(config.shutdown.deadline()).await {
        Ok(()) => tracing::info!("Shutdown complete"),
        Err(WorkerError::ShutdownTimeout { workers }) => {
            tracing::warn!(?workers, "Shutdown complete, some workers were aborted");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
