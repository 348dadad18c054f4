//! Fracture follow-up assistant
//!
//! Serves the chat assistant that appears next to an automated
//! fracture-detection result and walks the patient towards next steps.

mod advice;
mod api;
mod config;
mod db;
mod locator;
mod messages;
mod render;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::AssistantConfig;
use db::Database;
use runtime::{ClientGeolocator, DatabaseStorage, SessionManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fracture_assistant=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AssistantConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening session store");
    let db = Database::open(&config.db_path)?;

    if !config.geolocation {
        tracing::info!("Geolocation disabled; location searches are manual only");
    }

    let sessions = SessionManager::new(
        DatabaseStorage::new(db),
        Arc::new(ClientGeolocator::new(config.geolocation)),
    )
    .with_typing_delay(config.typing_delay);
    let state = AppState::new(sessions);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state.clone())
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Fracture assistant listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl-C, then close the session so open streams end
async fn shutdown_signal(state: AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    if let Err(e) = state.sessions.teardown().await {
        tracing::error!(error = %e, "Failed to tear down session");
    }
}
