use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

mod api;
mod config;
mod db;
mod error;
mod football_api;
mod notifier;
mod scheduler;
mod service;

use api::AppState;
use config::Config;
use db::Database;
use football_api::{FixtureProvider, FootballApiClient};
use notifier::{start_notifier, NotifierService, WebhookClient};
use scheduler::TaskRegistry;
use service::{MatchService, SubscriptionService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    let provider: Arc<dyn FixtureProvider> = Arc::new(FootballApiClient::new(
        &config.football_api_url,
        &config.football_api_key,
        config.http_timeout(),
    )?);
    info!("Fixture provider: {}", provider.name());
    let webhooks = Arc::new(WebhookClient::new(config.http_timeout())?);

    let registry = TaskRegistry::new();
    let polling = config.polling();
    info!(
        "Polling: first attempt {:?} after kickoff, every {:?}, {} retries",
        polling.first_attempt_delay, polling.interval, polling.max_retries
    );

    let matches = MatchService::new(
        db.clone(),
        provider,
        registry.clone(),
        polling,
        &config.football_api_timezone,
    );
    let subscriptions = SubscriptionService::new(db.clone(), registry);

    // Pollers live in memory only; re-arm them before accepting requests.
    let summary = matches
        .reconcile()
        .context("Failed to re-schedule matches")?;
    if summary.failed > 0 {
        warn!("{} match(es) could not be re-scheduled", summary.failed);
    }

    start_notifier(
        NotifierService::new(db.clone(), webhooks),
        config.notify_interval(),
    );

    let app = api::router(AppState {
        db,
        matches,
        subscriptions,
    });
    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
