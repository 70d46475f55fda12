//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! API server for group chat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use studysync_core::domain::ChatMessage;
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribes this connection to a group's chat room. Membership
    /// authorization happened upstream; history is fetched separately over
    /// REST, joining never replays a backlog.
    JoinRoom { group_id: Uuid },

    /// Sends a chat message to a group room.
    SendMessage { group_id: Uuid, content: String },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledges a room subscription.
    RoomJoined { group_id: Uuid },

    /// A chat message broadcast to every subscriber of the room, the sender
    /// included.
    Message {
        id: Uuid,
        group_id: Uuid,
        sender_id: Uuid,
        sender_name: String,
        content: String,
        created_at: DateTime<Utc>,
    },

    /// A recoverable failure, delivered only to the connection that caused it.
    Error { message: String },
}

impl From<ChatMessage> for ServerMessage {
    fn from(m: ChatMessage) -> Self {
        ServerMessage::Message {
            id: m.id,
            group_id: m.group_id,
            sender_id: m.sender_id,
            sender_name: m.sender_name,
            content: m.content,
            created_at: m.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse_from_tagged_json() {
        let group_id = Uuid::new_v4();
        let json = format!(r#"{{"type":"join_room","group_id":"{}"}}"#, group_id);
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(msg, ClientMessage::JoinRoom { group_id: g } if g == group_id));

        let json = format!(
            r#"{{"type":"send_message","group_id":"{}","content":"hi"}}"#,
            group_id
        );
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(msg, ClientMessage::SendMessage { content, .. } if content == "hi"));
    }

    #[test]
    fn server_messages_carry_the_type_tag() {
        let json =
            serde_json::to_string(&ServerMessage::Error { message: "nope".to_string() }).unwrap();
        assert!(json.contains(r#""type":"error""#));
    }
}
