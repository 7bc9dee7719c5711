use std::sync::Arc;

use axum::{Router, routing::get};
use rootcause::prelude::ResultExt;
use tokio::select;
use tokio::signal::unix::SignalKind;
use tokio::signal::unix::signal;
use tracing::Span;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Config,
    store::{RecordIdentity, azure::AzureDnsStore},
    types::AppState,
};

mod config;
mod credentials;
mod error;
mod store;
mod types;
mod update;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = run_server().await {
        error!(err = %e, "Application error");
        std::process::exit(1);
    }
}

async fn run_server() -> Result<(), rootcause::Report> {
    info!("Starting server");

    let config = Config::from_env()?;

    let state = AppState {
        credentials: credentials::from_settings(&config.credential),
        store: Arc::new(AzureDnsStore::new(RecordIdentity {
            subscription_id: config.subscription_id.clone(),
            resource_group: config.resource_group.clone(),
            zone_name: config.zone_name.clone(),
            record_set_name: config.record_set_name.clone(),
            record_type: config.record_type,
        })),
        record_type: config.record_type,
    };

    validate_record_access(&state).await?;

    let app = Router::new()
        .route("/update", get(update::handle_update_request))
        .with_state(state);

    let listen_addr = format!("{}:{}", config.interface, config.port);
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .context("Failed to bind to listen address")?;

    info!(
        "Listening on {}",
        listener.local_addr().context("Getting local address")?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async { graceful_shutdown().await }.instrument(Span::current()))
        .await
        .context("Server error")?;

    Ok(())
}

async fn validate_record_access(state: &AppState) -> Result<(), rootcause::Report> {
    info!(
        strategy = state.credentials.strategy(),
        "Checking credential and record access..."
    );

    let token = state
        .credentials
        .acquire()
        .await
        .context("Failed to acquire a credential on startup")?;

    let record = state
        .store
        .fetch(&token)
        .await
        .context("Failed to fetch the DNS record on startup")
        .attach("I think you probably want to fix that before I start...")?;

    info!(address = %record.address, "Record reachable");

    Ok(())
}

async fn graceful_shutdown() {
    let mut sigterm = signal(SignalKind::terminate()).unwrap();
    let interrupt = tokio::signal::ctrl_c();
    select! {
        _ = sigterm.recv() => warn!("Received SIGTERM"),
        _ = interrupt => warn!("Received SIGINT")
    }
}
