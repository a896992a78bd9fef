//! salsa: load-shedding alert scheduler.
//!
//! Polls the national stage feed, schedules warnings ahead of each outage
//! window for the configured block and publishes them to a broker.
//!
//! Publishes `{prefix}.alert`, `{prefix}.stage` and `{prefix}.status`;
//! any message on `{prefix}.sync` forces a schedule refresh.

mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use salsa_adapters::http::HttpScheduleSource;
use salsa_adapters::log::LogNotifier;
use salsa_adapters::nats::NatsNotifier;
use salsa_app::config::AlertConfig;
use salsa_app::controller::ScheduleController;
use salsa_app::runner::ControllerHandle;
use salsa_core::clock::SystemClock;
use salsa_ports::outbound::Notifier;
use salsa_ports::types::{PublishOptions, Topic};

use crate::config::ServerConfig;

// ── CLI ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "salsa", version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "SALSA_CONFIG", default_value = "config.toml")]
    config: String,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = ServerConfig::load(&cli.config)?;
    info!(path = %cli.config, "loaded config");

    let alerts = AlertConfig::try_from(config.alerts).context("invalid [alerts] section")?;
    let source = HttpScheduleSource::new(config.source).context("failed to build HTTP client")?;

    let notifier: Arc<dyn Notifier> = match &config.nats {
        Some(nats) => Arc::new(NatsNotifier::connect(nats, alerts.topic_prefix()).await?),
        None => {
            warn!("no [nats] section configured, notifications will only be logged");
            Arc::new(LogNotifier::new(alerts.topic_prefix()))
        }
    };

    publish_status(notifier.as_ref(), "UP").await;

    let controller = ScheduleController::new(alerts, source, notifier.clone(), SystemClock);
    let mut handle = ControllerHandle::start(controller);

    if let Err(e) = notifier
        .subscribe(Topic::Sync, handle.resync_trigger().handler())
        .await
    {
        warn!(error = %e, "resync subscription unavailable");
    }

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown requested");
            Ok(())
        }
        closed = handle.closed() => closed,
    };

    handle.stop().await?;
    publish_status(notifier.as_ref(), "DOWN").await;
    info!("salsa exited");

    outcome.context("schedule controller stopped unexpectedly")
}

async fn publish_status(notifier: &dyn Notifier, status: &str) {
    if let Err(e) = notifier
        .publish(Topic::Status, status.as_bytes().to_vec(), PublishOptions::ALERT)
        .await
    {
        warn!(status, error = %e, "failed to publish service status");
    }
}
