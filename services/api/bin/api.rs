//! Main Entrypoint for the Voice Relay API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the base system instruction.
//! 3. Constructing the shared Gemini Live client.
//! 4. Constructing the Axum router.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use gemini_live::GeminiLiveClient;
use std::{net::SocketAddr, path::Path, sync::Arc};
use tracing::info;
use voice_relay_api::{
    config::Config,
    router::create_router,
    state::{AppState, DEFAULT_SYSTEM_INSTRUCTION},
};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Reads the base system instruction, falling back to the built-in one.
fn load_system_instruction(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => {
            let instruction = std::fs::read_to_string(path).with_context(|| {
                format!("Failed to read system instruction from {}", path.display())
            })?;
            info!(path = %path.display(), "Loaded system instruction from file.");
            Ok(instruction)
        }
        None => Ok(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let system_instruction = Arc::new(load_system_instruction(
        config.system_instruction_path.as_deref(),
    )?);

    let live_client = Arc::new(
        GeminiLiveClient::new(config.google_api_key.clone(), config.gemini_model.clone())
            .with_endpoint(config.gemini_live_url.clone()),
    );

    let app_state = Arc::new(AppState {
        live_client,
        system_instruction,
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router ---
    let app = create_router(app_state);

    // --- 5. Start Server ---
    info!(
        model = %config.gemini_model,
        bind_address = %config.bind_address,
        idle_timeout = ?config.listen_idle_timeout,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
