//! WebSocket connection handlers.
//!
//! One task per connection drives a [`RoomSession`]: inbound frames go to
//! `receive`, events from the registry channel go out through `on_event`, and
//! server shutdown closes the socket with "going away".

use std::sync::Arc;

use axum::{
    extract::{
        Path, Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
    domain::RoomId,
    infrastructure::dto::websocket::encode_event,
    ui::state::AppState,
    usecase::{RoomSession, SessionError},
};

/// Normal closure
pub const CLOSE_NORMAL: u16 = 1000;
/// Server is shutting down
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Connection dropped without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Inbound frame could not be decoded
pub const CLOSE_INVALID_PAYLOAD: u16 = 1007;
/// Credentials missing or rejected
pub const CLOSE_AUTH_FAILED: u16 = 4001;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    // Convert String -> RoomId (Domain Model)
    let room_id = match RoomId::try_from(room_id) {
        Ok(room_id) => room_id,
        Err(e) => {
            tracing::warn!("Invalid room id: {}", e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, room_id, query.token)))
}

/// How the connection loop ended
enum Exit {
    /// The client closed or the transport failed; nothing left to send.
    Peer(u16),
    /// The server closes the socket with this code.
    Server(u16, &'static str),
}

async fn handle_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    room_id: RoomId,
    token: Option<String>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = RoomSession::new(Arc::clone(&state.context), room_id);

    if let Err(e) = session.connect(token.as_deref(), tx).await {
        tracing::warn!(
            room_id = %session.room_id(),
            connection_id = %session.connection_id(),
            "Rejecting connection: {}",
            e
        );
        let _ = socket
            .send(close_message(CLOSE_AUTH_FAILED, "authentication failed"))
            .await;
        return;
    }

    let mut shutdown = state.shutdown.clone();
    let (mut sender, mut receiver) = socket.split();

    let exit = loop {
        tokio::select! {
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => match session.receive(text.as_str()).await {
                    Ok(event) => {
                        tracing::debug!(
                            room_id = %event.room_id,
                            user_id = %event.user_id,
                            "Chat message accepted"
                        );
                    }
                    Err(e) if e.is_fatal() => {
                        tracing::warn!(connection_id = %session.connection_id(), "Closing connection: {}", e);
                        break fatal_exit(&e);
                    }
                    Err(e) => {
                        tracing::warn!(connection_id = %session.connection_id(), "Message dropped: {}", e);
                    }
                },
                Some(Ok(Message::Binary(_))) => {
                    tracing::warn!(connection_id = %session.connection_id(), "Binary frames are not supported");
                    break Exit::Server(CLOSE_INVALID_PAYLOAD, "binary frames are not supported");
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map(|frame| frame.code).unwrap_or(CLOSE_NORMAL);
                    tracing::info!(connection_id = %session.connection_id(), code, "Client requested close");
                    break Exit::Peer(code);
                }
                // Ping/pong is handled automatically by the WebSocket protocol
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(connection_id = %session.connection_id(), "WebSocket error: {}", e);
                    break Exit::Peer(CLOSE_ABNORMAL);
                }
                None => break Exit::Peer(CLOSE_ABNORMAL),
            },
            outbound = rx.recv() => {
                let Some(event) = outbound else {
                    break Exit::Server(CLOSE_NORMAL, "");
                };
                let Some(event) = session.on_event(event) else {
                    continue;
                };
                let json = match encode_event(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to encode outbound frame: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break Exit::Peer(CLOSE_ABNORMAL);
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break Exit::Server(CLOSE_GOING_AWAY, "server shutting down");
                }
            },
        }
    };

    let reason_code = match exit {
        Exit::Peer(code) => code,
        Exit::Server(code, reason) => {
            let _ = sender.send(close_message(code, reason)).await;
            code
        }
    };
    session.disconnect(reason_code).await;
}

fn fatal_exit(error: &SessionError) -> Exit {
    match error {
        SessionError::Auth(_) => Exit::Server(CLOSE_AUTH_FAILED, "authentication failed"),
        _ => Exit::Server(CLOSE_INVALID_PAYLOAD, "malformed frame"),
    }
}

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
