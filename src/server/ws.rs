//! WebSocket connection handling.
//!
//! One task per connection owns the socket and runs a select loop over
//! incoming frames and the connection's outbound event queue. All writes to
//! the socket happen here, so events for a connection are serialized no
//! matter which task produced them.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use tokio::select;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::audio::MAX_CHUNK_SIZE_BYTES;
use crate::config::streaming::OUTBOUND_QUEUE_CAPACITY;
use crate::error::{AppError, Result};
use crate::server::events::ServerEvent;
use crate::server::AppState;
use crate::session::ConnectionId;

/// Drive one WebSocket connection until it disconnects or fails.
pub async fn handle_connection(mut socket: WebSocket, state: Arc<AppState>) {
    let conn_id = ConnectionId::new();
    let connections = state.metrics.connection_opened();
    let (outbound_tx, mut outbound_rx) =
        mpsc::channel::<ServerEvent>(OUTBOUND_QUEUE_CAPACITY);

    info!(conn_id = %conn_id, connections, "client connected");

    let welcome = ServerEvent::connection(connections, &state.config.default_language);
    if send_event(&mut socket, &welcome).await.is_err() {
        state.metrics.connection_closed();
        return;
    }

    loop {
        select! {
            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        debug!(conn_id = %conn_id, "text frame received");
                        if outbound_tx.send(ServerEvent::echo(&text)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if let Err(e) =
                            handle_audio_frame(&state, conn_id, data, &outbound_tx).await
                        {
                            state.metrics.record_error();
                            warn!(conn_id = %conn_id, error = %e, "audio frame rejected");
                            if outbound_tx.send(ServerEvent::error(&e.to_string())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(conn_id = %conn_id, "client closed connection");
                        break;
                    }
                    // Ping/pong are answered by the protocol layer.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(conn_id = %conn_id, error = %e, "transport receive failed");
                        break;
                    }
                    None => break,
                }
            }
            event = outbound_rx.recv() => {
                // This loop holds a sender, so the queue cannot be closed.
                if let Some(event) = event {
                    if send_event(&mut socket, &event).await.is_err() {
                        warn!(conn_id = %conn_id, "transport send failed");
                        break;
                    }
                }
            }
        }
    }

    // Disconnect and transport failure share the explicit-stop teardown path.
    // Close the outbound queue first so a relay blocked on a full queue can
    // observe the transport is gone and wind down.
    drop(outbound_tx);
    drop(outbound_rx);
    state.registry.stop_session(conn_id).await;
    state.metrics.connection_closed();
    info!(conn_id = %conn_id, "client disconnected");
}

/// Route one binary frame into the connection's session, creating the session
/// on the first frame.
async fn handle_audio_frame(
    state: &Arc<AppState>,
    conn_id: ConnectionId,
    data: Vec<u8>,
    outbound: &mpsc::Sender<ServerEvent>,
) -> Result<()> {
    if data.is_empty() {
        return Err(AppError::Validation("empty audio frame".to_string()));
    }
    if data.len() > MAX_CHUNK_SIZE_BYTES {
        return Err(AppError::Validation(format!(
            "audio frame too large: {} bytes",
            data.len()
        )));
    }

    if !state.registry.has_session(conn_id).await {
        let session_id = state
            .registry
            .start_session(
                conn_id,
                &state.config.default_language,
                "audio/webm",
                outbound.clone(),
            )
            .await?;
        state.metrics.record_session_started();
        outbound
            .send(ServerEvent::binary_streaming_started(session_id))
            .await
            .map_err(|_| AppError::Transport("outbound queue closed".to_string()))?;
    }

    state.registry.feed_audio(conn_id, Bytes::from(data)).await
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<()> {
    let json = serde_json::to_string(event)?;
    socket
        .send(Message::Text(json))
        .await
        .map_err(|e| AppError::Transport(format!("WebSocket send error: {}", e)))
}
