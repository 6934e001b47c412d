//! `run` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::assemble::assemble;
use crate::cli::RunArgs;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading blueprint");

    if !args.config.exists() {
        anyhow::bail!("Blueprint file not found: {}", args.config.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load blueprint from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(buffer_size_s) = args.buffer_size_s {
        info!(buffer_size_s, "Overriding buffer size from CLI");
        blueprint.settings.buffer_size_s = buffer_size_s;
    }
    if let Some(port) = args.metrics_port {
        blueprint.settings.metrics_port = if port == 0 { None } else { Some(port) };
    }

    info!(
        sources = blueprint.sources.len(),
        transformers = blueprint.transformers.len(),
        consumers = blueprint.consumers.len(),
        "Blueprint loaded"
    );

    if let Some(port) = blueprint.settings.metrics_port {
        observability::init_metrics_only(port)?;
    }

    let mut pipeline = assemble(&blueprint).context("Failed to assemble pipeline")?;
    pipeline.start().context("Failed to start pipeline")?;
    info!("Pipeline running");

    let deadline = async {
        if args.duration_s > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(args.duration_s)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = deadline => {
            info!(duration_s = args.duration_s, "Run duration elapsed");
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping pipeline");
        }
    }

    pipeline.stop().await.context("Failed to stop pipeline")?;

    let stats = pipeline.stats();
    info!(
        cycles_run = stats.cycles_run,
        cycles_skipped = stats.cycles_skipped,
        components_disabled = stats.components_disabled,
        source_errors = stats.source_errors,
        "Pipeline finished"
    );
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
