//! Streaming speech-to-text relay server.
//!
//! This is the entry point for the relay server. It initializes the
//! configuration, connects the recognizer client, wires up the session
//! registry and HTTP server, and starts listening for connections.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::fmt;

use stt_relay_server::{
    config::Config,
    error::Result,
    server::{create_router, AppState},
    session::SessionRegistry,
    speech::GrpcRecognizer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .json()
        .init();

    // Load configuration
    let config = Config::load()?;

    // Connect the speech recognizer client
    info!("Connecting to recognizer at {}", config.recognizer_endpoint);
    let recognizer = Arc::new(GrpcRecognizer::connect(&config.recognizer_endpoint).await?);

    // Create the session registry and application state
    let registry = Arc::new(SessionRegistry::new(recognizer.clone(), config.clone()));
    let state = Arc::new(AppState::new(recognizer, registry.clone(), config.clone()));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    Ok(())
}

/// Wait for SIGINT/SIGTERM, then stop every live session before the server
/// finishes draining connections.
async fn shutdown_signal(registry: Arc<SessionRegistry>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping sessions");
    registry.stop_all().await;
}
