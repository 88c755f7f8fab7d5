mod api;
mod config;
mod dispatch;
mod error;
mod geo;
mod models;
mod observability;
mod relay;
mod rooms;
mod routing;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::routing::OsrmRouteEstimator;

const REAPER_PERIOD: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let state = Arc::new(state::AppState::new(Duration::from_secs(
        config.dispatch_window_secs,
    )));

    let app = api::rest::router(state.clone());

    tokio::spawn(rooms::reaper::run_room_reaper(
        state.clone(),
        Duration::from_secs(config.room_idle_ttl_secs),
        REAPER_PERIOD,
    ));

    let estimator = Arc::new(OsrmRouteEstimator::new(config.route_service_url.clone()));
    tokio::spawn(routing::run_route_poller(
        state.clone(),
        estimator,
        Duration::from_secs(config.route_poll_secs),
    ));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        dispatch_window_secs = config.dispatch_window_secs,
        "order relay started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal")
    }
}
