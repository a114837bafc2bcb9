mod api;
mod config;
mod engine;
mod error;
mod geo;
mod models;
mod observability;
mod provider;
mod state;
mod store;
mod traffic;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use crate::provider::{
    GoogleDirectionsProvider, ResilientProvider, RoutingProvider, StraightLineProvider,
};
use crate::traffic::TrafficIndex;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let upstream: Arc<dyn RoutingProvider> = match &config.google_api_key {
        Some(key) => Arc::new(GoogleDirectionsProvider::new(
            key.clone(),
            config.directions_base_url.clone(),
            config.orchestrator.detour_offset_km,
        )?),
        None => {
            tracing::warn!("GOOGLE_MAPS_API_KEY not set; using straight-line routing");
            Arc::new(StraightLineProvider::new(config.orchestrator.detour_offset_km))
        }
    };
    tracing::info!(provider = upstream.name(), "routing provider configured");
    let provider = Arc::new(ResilientProvider::new(upstream, config.provider.clone()));

    let traffic = match &config.traffic_data_path {
        Some(path) => {
            let index = TrafficIndex::load(path)?;
            tracing::info!(path = %path, "traffic data loaded");
            index
        }
        None => TrafficIndex::empty(),
    };

    let app_state = state::AppState::new(
        config.orchestrator.clone(),
        provider,
        traffic,
        config.event_buffer_size,
    )
    .with_static_dir(config.static_dir.clone());
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_purge_loop(shared_state.clone(), config.orchestrator.cache_ttl));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

/// Drops expired hazards and stale cache entries on a fixed interval.
async fn run_purge_loop(state: Arc<state::AppState>, cache_ttl: Duration) {
    let mut ticker = tokio::time::interval(PURGE_INTERVAL);
    loop {
        ticker.tick().await;

        match state.hazards.purge_expired(Utc::now()).await {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "purged expired hazards"),
            Err(err) => tracing::error!(error = %err, "hazard purge failed"),
        }

        let evicted = state.orchestrator.cache().purge_expired(cache_ttl);
        if evicted > 0 {
            tracing::debug!(evicted, "evicted expired cached routes");
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
