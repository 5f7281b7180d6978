//! latscaled — the latency-driven autoscaler daemon.
//!
//! Watches one namespace, samples each workload's latency ratio from
//! Prometheus, and nudges its Deployment by one replica at a time.
//!
//! # Usage
//!
//! ```text
//! latscaled --namespace pycont --prometheus-url http://prometheus:9090
//! ```
//!
//! Every flag can also be set from the environment (see `--help`).

mod cli;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use latscale_autoscale::{ControlLoop, LoopSettings, ScalingPolicy};
use latscale_metrics::PrometheusClient;
use latscale_orchestrator::KubernetesClient;

use crate::cli::{Cli, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = cli.into_config().context("invalid configuration")?;
    info!(
        namespace = %config.namespace,
        own_name = %config.own_name,
        prometheus = %config.metrics.endpoint,
        "latscaled starting"
    );

    let metrics = PrometheusClient::new(&config.metrics).context("building metrics client")?;
    let orchestrator =
        KubernetesClient::from_config(&config.orchestrator).context("building orchestration client")?;

    let mut control = ControlLoop::new(
        orchestrator,
        metrics,
        ScalingPolicy::new(config.thresholds),
        LoopSettings::from_config(&config),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        control.run(shutdown_rx).await;
    });

    shutdown_signal().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    handle.await.context("control loop task panicked")?;
    info!("latscaled stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,latscaled=debug,latscale=debug"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("installing Ctrl-C handler")?,
            _ = terminate.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("installing Ctrl-C handler")
    }
}
