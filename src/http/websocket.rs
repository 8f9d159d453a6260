//! WebSocket client handling.
//!
//! # Responsibilities
//! - Complete the upgrade for `/ws/{topic}`
//! - Register the client in the connection pool under its topic
//! - Dispatch inbound commands and queue their replies
//! - Unregister the client when either side closes, or when the pool evicts it
//!
//! # Data Flow
//! ```text
//! client frame → ClientCommand::parse → dispatch → reply ──┐
//!                                                           ├→ outbound queue → writer task → client
//! ConnectionPool::broadcast (setting_changed, results) ─────┘
//! ```
//!
//! # Design Decisions
//! - Replies go through the same queue as broadcasts, so a client sees them in order
//! - Dispatch is synchronous; nothing holds a lock across an `.await`
//! - `set` writes the settings file, so it runs on the blocking pool
//! - Malformed frames are dropped; the connection stays open

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::http::request::{setting_value, ClientCommand};
use crate::http::response::{self, CommandError};
use crate::http::server::AppState;
use crate::pool::{ClientConnection, ConnectionState, OutboundConnection};

/// How long the writer may take to send the close frame.
const WRITER_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Upgrade handler for `/ws/{topic}`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(topic): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, topic, state))
}

async fn handle_socket(socket: WebSocket, topic: String, state: AppState) {
    let (conn, mut outbound) = OutboundConnection::new(state.send_buffer);
    let id = conn.id();
    let _guard = state.tracker.track(id);
    let (mut sink, mut stream) = socket.split();

    let (stop_writer, mut writer_stopped) = oneshot::channel::<()>();
    let mut writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                text = outbound.recv() => match text {
                    Some(text) => {
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            return;
                        }
                    }
                    None => break,
                },
                _ = &mut writer_stopped => break,
            }
        }
        let _ = sink.close().await;
    });

    state.pool.add(&topic, conn.clone());
    tracing::info!(topic = %topic, connection_id = %id, "Client connected");

    let mut shutdown = state.shutdown.subscribe();
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_text(&state, &topic, &conn, text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(connection_id = %id, error = %e, "WebSocket receive failed");
                    break;
                }
            },
            _ = conn.close_requested() => {
                tracing::info!(topic = %topic, connection_id = %id, "Client evicted, closing socket");
                break;
            }
            _ = shutdown.recv() => break,
        }
    }

    conn.mark(ConnectionState::HalfClosed);
    state.pool.remove(&topic, id);
    conn.mark(ConnectionState::Closed);

    let _ = stop_writer.send(());
    if tokio::time::timeout(WRITER_CLOSE_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
    tracing::info!(topic = %topic, connection_id = %id, "Client disconnected");
}

async fn handle_text(state: &AppState, topic: &str, conn: &Arc<OutboundConnection>, text: &str) {
    let Some(command) = ClientCommand::parse(text) else {
        return;
    };
    let name = command.name();
    tracing::debug!(connection_id = %conn.id(), command = name, "Command received");

    let outcome = match command {
        ClientCommand::Set { .. } => {
            let state = state.clone();
            tokio::task::spawn_blocking(move || dispatch(&state, command))
                .await
                .unwrap_or_else(|e| Err(CommandError::from(e)))
        }
        command => dispatch(state, command),
    };

    let (reply, event) = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::debug!(connection_id = %conn.id(), command = name, error = %e, "Command failed");
            (e.to_reply(), None)
        }
    };

    if let Err(e) = conn.send(&reply.to_string()) {
        tracing::warn!(connection_id = %conn.id(), error = %e, "Reply dropped");
    }
    if let Some(event) = event {
        state.pool.broadcast(topic, &event.to_string());
    }
}

/// Run `command`. Returns the reply and, for `set`, the event to broadcast.
pub fn dispatch(state: &AppState, command: ClientCommand) -> Result<(Value, Option<Value>), CommandError> {
    match command {
        ClientCommand::Get { path } => {
            let value = state.settings.get_value(&path)?;
            Ok((response::value_reply(&path, &value), None))
        }
        ClientCommand::Set { path, value } => {
            let value = setting_value(&path, value.as_ref())?;
            let written = state.settings.set_value(&path, value)?;
            Ok((
                response::value_reply(&path, &written),
                Some(response::setting_changed(&path, &written)),
            ))
        }
        ClientCommand::Render { path } => {
            let html = state.settings.render(&path)?;
            Ok((response::render_reply(&path, &html), None))
        }
        ClientCommand::Activate => {
            state.runners.activate()?;
            Ok((response::running_reply(true), None))
        }
        ClientCommand::Deactivate => {
            state.runners.deactivate();
            Ok((response::running_reply(false), None))
        }
        ClientCommand::Call { name, args } => {
            let result = state.callbacks.call(&name, &args)?;
            Ok((response::call_reply(&name, result), None))
        }
    }
}
