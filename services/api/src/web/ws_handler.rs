//! services/api/src/web/ws_handler.rs
//!
//! The entry point and control loop for a chat WebSocket connection. Each
//! connection gets its own id, subscribes to rooms through the shared
//! `ChatRooms` registry, and receives broadcasts over a per-connection
//! channel that a forwarding task drains into the socket.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use studysync_core::domain::ChatMessage;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>, // from auth middleware
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    let connection_id = Uuid::new_v4();
    info!(
        "New chat connection {} established for user: {}",
        connection_id, user_id
    );

    // The sender is wrapped in an Arc<Mutex<>> to allow for shared mutable
    // access from both the read loop and the broadcast-forwarding task.
    let (sender, mut receiver) = socket.split();
    let ws_sender = Arc::new(Mutex::new(sender));

    // Room broadcasts arrive on this channel; one task drains it into the
    // socket so a slow socket never blocks a room's fan-out.
    let (broadcast_tx, mut broadcast_rx) = mpsc::unbounded_channel::<ChatMessage>();
    let forward_task = {
        let ws_sender = ws_sender.clone();
        tokio::spawn(async move {
            while let Some(message) = broadcast_rx.recv().await {
                let json = serde_json::to_string(&ServerMessage::from(message)).unwrap();
                if ws_sender.lock().await.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        })
    };

    // --- Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                handle_text_message(
                    text.to_string(),
                    &app_state,
                    user_id,
                    connection_id,
                    &broadcast_tx,
                    &ws_sender,
                )
                .await;
            }
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- Cleanup ---
    app_state.rooms.leave_all(connection_id).await;
    forward_task.abort();
    info!("Chat connection {} closed.", connection_id);
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: String,
    app_state: &Arc<AppState>,
    user_id: Uuid,
    connection_id: Uuid,
    broadcast_tx: &mpsc::UnboundedSender<ChatMessage>,
    ws_sender: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
) {
    match serde_json::from_str::<ClientMessage>(&text) {
        Ok(ClientMessage::JoinRoom { group_id }) => {
            // Membership authorization happened before this connection was
            // allowed in; the room layer only manages delivery.
            app_state
                .rooms
                .join(group_id, connection_id, broadcast_tx.clone())
                .await;
            let ack = serde_json::to_string(&ServerMessage::RoomJoined { group_id }).unwrap();
            let _ = ws_sender.lock().await.send(Message::Text(ack.into())).await;
        }
        Ok(ClientMessage::SendMessage { group_id, content }) => {
            // On success the broadcast loops back to this connection too, so
            // there is nothing else to send here.
            if let Err(e) = app_state
                .rooms
                .send_message(group_id, user_id, &content)
                .await
            {
                warn!("Failed to send chat message: {}", e);
                let err_msg = ServerMessage::Error {
                    message: e.to_string(),
                };
                let err_json = serde_json::to_string(&err_msg).unwrap();
                let _ = ws_sender.lock().await.send(Message::Text(err_json.into())).await;
            }
        }
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
        }
    }
}
