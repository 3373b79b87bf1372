//! Inkwell Generation Orchestrator - Main Entry Point

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use inkwell_api_http::{build_router, AppState, JsonShapeValidator};
use inkwell_core::application::{GenerationPorts, GenerationService};
use inkwell_core::port::id_provider::UuidProvider;
use inkwell_core::port::time_provider::SystemTimeProvider;
use inkwell_infra_system::{CliAuthProbe, CliProcessSpawner};

use crate::config::{DaemonConfig, LogConfig, LogFormat};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_LOG_FILTER: &str = "inkwell=info,tower_http=info";
const LOG_FILE_PREFIX: &str = "inkwell-orchestrator.log";

/// Budget for supervised processes to stop on shutdown
const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let _log_guard = init_logging(&LogConfig::from_env())?;

    info!("Inkwell Generation Orchestrator v{} starting...", VERSION);

    // 2. Load configuration
    let config = DaemonConfig::from_env();
    info!(
        program = %config.command.program,
        max_active_jobs = config.orchestrator.max_active_jobs,
        job_timeout_secs = config.orchestrator.job_timeout.as_secs(),
        "Configuration loaded"
    );

    // 3. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let service = Arc::new(GenerationService::new(
        &config.orchestrator,
        GenerationPorts {
            validator: Arc::new(JsonShapeValidator),
            spawner: Arc::new(CliProcessSpawner::new(config.command.clone())),
            auth_probe: Arc::new(CliAuthProbe::new(config.command.clone())),
            id_provider: Arc::new(UuidProvider),
            time_provider,
        },
    ));

    // 4. Start reclamation scheduler
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let reclamation = service.reclamation_scheduler();
    let reclamation_handle = tokio::spawn(reclamation.run(stop_rx));

    // 5. Start HTTP gateway
    let addr = config.gateway.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let router = build_router(AppState::new(service.clone(), config.gateway.clone()));

    info!(addr = %addr, "System ready. Accepting generation requests");
    info!("Press Ctrl+C to shutdown");

    // 6. Serve until Ctrl+C; jobs are stopped first so open streams can end
    let stopping = service.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received. Stopping generation jobs...");
            let stopped = stopping.shutdown(SHUTDOWN_WAIT).await;
            info!(stopped = stopped, "Generation jobs stopped");
        })
        .await
        .context("HTTP server failed")?;

    // 7. Graceful shutdown
    stop_tx.send_replace(true);
    match tokio::time::timeout(SHUTDOWN_WAIT, reclamation_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Reclamation scheduler task failed"),
        Err(_) => warn!("Reclamation scheduler did not stop in time"),
    }
    telemetry::shutdown();

    info!("Shutdown complete.");
    Ok(())
}

/// Stdout (json or pretty), optional daily file, optional OpenTelemetry
fn init_logging(log: &LogConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("Failed to create env filter")?;

    let mut layers: Vec<telemetry::BoxedLayer> = Vec::new();

    match log.format {
        // Production: JSON structured logging
        LogFormat::Json => layers.push(fmt::layer().json().boxed()),
        // Development: Pretty formatting with colors
        LogFormat::Pretty => layers.push(fmt::layer().pretty().boxed()),
    }

    let guard = match &log.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt::layer().json().with_writer(writer).boxed());
            Some(guard)
        }
        None => None,
    };

    let telemetry_error = match telemetry::layer() {
        Ok(Some(layer)) => {
            layers.push(layer);
            None
        }
        Ok(None) => None,
        Err(e) => Some(e),
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(e) = telemetry_error {
        warn!(error = ?e, "Failed to initialize OpenTelemetry (continuing without it)");
    }
    if let Some(dir) = &log.dir {
        info!(log_dir = %dir.display(), "Writing daily log files");
    }

    Ok(guard)
}
