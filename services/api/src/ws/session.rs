//! Manages the WebSocket connection lifecycle for a voice relay session.

use super::relay::TurnRelay;
use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Each socket gets its own relay; nothing is shared between connections
/// apart from the upstream client factory and the base system instruction.
#[instrument(name = "ws_session", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id: u32 = rand::random();
    tracing::Span::current().record("connection_id", connection_id);
    info!("WebSocket client connected.");

    let (mut socket_tx, mut socket_rx) = socket.split();
    let mut relay = TurnRelay::new(
        state.live_client.clone(),
        state.system_instruction.clone(),
        state.config.listen_idle_timeout,
    );

    match relay.run(&mut socket_tx, &mut socket_rx).await {
        Ok(()) => info!(turns = relay.turns(), "Relay session finished."),
        Err(e) => error!(turns = relay.turns(), error = %e, "Relay session terminated with error."),
    }

    // The peer may already be gone; a failed close is expected then.
    let _ = socket_tx.close().await;
    info!("WebSocket closed.");
}
