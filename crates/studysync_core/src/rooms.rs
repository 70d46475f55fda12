//! crates/studysync_core/src/rooms.rs
//!
//! The room broadcaster. Each group maps to one room task that owns the
//! room's subscriber set and processes joins, leaves, and sends one at a
//! time. Routing every send for a room through its single writer means
//! messages fan out in exactly the order they were persisted, without any
//! lock held across the store round trip.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

use crate::domain::ChatMessage;
use crate::error::{DomainError, DomainResult};
use crate::ports::{PortError, StudyStore};

/// The handle a connection registers to receive room broadcasts.
pub type Subscriber = mpsc::UnboundedSender<ChatMessage>;

enum RoomCommand {
    Join {
        connection_id: Uuid,
        subscriber: Subscriber,
    },
    Leave {
        connection_id: Uuid,
    },
    Send {
        sender_id: Uuid,
        content: String,
        reply: oneshot::Sender<DomainResult<ChatMessage>>,
    },
}

/// The registry of live rooms, keyed by group id. Room tasks are spawned
/// lazily on first use and live for the rest of the process.
pub struct ChatRooms {
    store: Arc<dyn StudyStore>,
    rooms: Mutex<HashMap<Uuid, mpsc::UnboundedSender<RoomCommand>>>,
}

impl ChatRooms {
    pub fn new(store: Arc<dyn StudyStore>) -> Self {
        Self {
            store,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribes a connection to a group's room. Membership authorization
    /// happens before the connection is allowed to get here; this layer only
    /// manages delivery.
    pub async fn join(&self, group_id: Uuid, connection_id: Uuid, subscriber: Subscriber) {
        let room = self.room_handle(group_id).await;
        let _ = room.send(RoomCommand::Join {
            connection_id,
            subscriber,
        });
    }

    /// Drops a connection from every room it may be subscribed to. Called on
    /// disconnect; rooms the connection never joined ignore the leave.
    pub async fn leave_all(&self, connection_id: Uuid) {
        let rooms = self.rooms.lock().await;
        for room in rooms.values() {
            let _ = room.send(RoomCommand::Leave { connection_id });
        }
    }

    /// Persists a message and fans it out to every connection subscribed to
    /// the room at the moment persistence completed, the sender's own
    /// connection included. A persistence failure aborts the send before any
    /// delivery and is returned to the caller.
    pub async fn send_message(
        &self,
        group_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> DomainResult<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::Validation(
                "Message content cannot be empty.".to_string(),
            ));
        }

        let room = self.room_handle(group_id).await;
        let (reply_tx, reply_rx) = oneshot::channel();
        room.send(RoomCommand::Send {
            sender_id,
            content: content.to_string(),
            reply: reply_tx,
        })
        .map_err(|_| {
            DomainError::Store(PortError::Unexpected("room task is gone".to_string()))
        })?;

        reply_rx.await.map_err(|_| {
            DomainError::Store(PortError::Unexpected("room task dropped the reply".to_string()))
        })?
    }

    async fn room_handle(&self, group_id: Uuid) -> mpsc::UnboundedSender<RoomCommand> {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(group_id)
            .or_insert_with(|| {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(room_task(group_id, self.store.clone(), rx));
                tx
            })
            .clone()
    }
}

/// The single writer for one room. Owns the subscriber set outright, so no
/// synchronization is needed around it.
async fn room_task(
    group_id: Uuid,
    store: Arc<dyn StudyStore>,
    mut commands: mpsc::UnboundedReceiver<RoomCommand>,
) {
    let mut subscribers: HashMap<Uuid, Subscriber> = HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            RoomCommand::Join {
                connection_id,
                subscriber,
            } => {
                subscribers.insert(connection_id, subscriber);
            }
            RoomCommand::Leave { connection_id } => {
                subscribers.remove(&connection_id);
            }
            RoomCommand::Send {
                sender_id,
                content,
                reply,
            } => {
                match store.insert_message(group_id, sender_id, &content).await {
                    Ok(message) => {
                        // A subscriber whose connection died mid-broadcast is
                        // pruned; the remaining deliveries go through.
                        subscribers.retain(|_, sub| sub.send(message.clone()).is_ok());
                        let _ = reply.send(Ok(message));
                    }
                    Err(e) => {
                        // No partial broadcast: nothing was delivered.
                        let _ = reply.send(Err(e.into()));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryStore;

    fn rooms_with_store() -> (Arc<InMemoryStore>, ChatRooms) {
        let store = Arc::new(InMemoryStore::new());
        let rooms = ChatRooms::new(store.clone());
        (store, rooms)
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber_including_the_sender() {
        let (store, rooms) = rooms_with_store();
        let sender = store.add_user("sender");
        let group = Uuid::new_v4();

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();
        rooms.join(group, Uuid::new_v4(), tx1).await;
        rooms.join(group, Uuid::new_v4(), tx2).await;
        rooms.join(group, Uuid::new_v4(), tx3).await;

        let sent = rooms.send_message(group, sender, "hi").await.unwrap();
        assert_eq!(sent.content, "hi");
        assert_eq!(sent.sender_name, "sender");

        for rx in [&mut rx1, &mut rx2, &mut rx3] {
            let got = rx.recv().await.unwrap();
            assert_eq!(got.id, sent.id);
            assert_eq!(got.content, "hi");
        }
    }

    #[tokio::test]
    async fn delivery_order_matches_persistence_order() {
        let (store, rooms) = rooms_with_store();
        let sender = store.add_user("sender");
        let group = Uuid::new_v4();

        let (tx, mut rx) = mpsc::unbounded_channel();
        rooms.join(group, Uuid::new_v4(), tx).await;

        rooms.send_message(group, sender, "one").await.unwrap();
        rooms.send_message(group, sender, "two").await.unwrap();
        rooms.send_message(group, sender, "three").await.unwrap();

        let order: Vec<String> = vec![
            rx.recv().await.unwrap().content,
            rx.recv().await.unwrap().content,
            rx.recv().await.unwrap().content,
        ];
        assert_eq!(order, ["one", "two", "three"]);

        // History comes back in the same order, timestamps non-decreasing.
        let history = store.messages_for_group(group, 50).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn persistence_failure_aborts_the_send_without_any_delivery() {
        let (store, rooms) = rooms_with_store();
        let sender = store.add_user("sender");
        let group = Uuid::new_v4();

        let (tx, mut rx) = mpsc::unbounded_channel();
        rooms.join(group, Uuid::new_v4(), tx).await;

        store.fail_message_inserts(true);
        let err = rooms.send_message(group, sender, "doomed").await.unwrap_err();
        assert!(matches!(err, DomainError::Store(_)));
        assert!(rx.try_recv().is_err());

        // The subscription survives the failure.
        store.fail_message_inserts(false);
        rooms.send_message(group, sender, "recovered").await.unwrap();
        assert_eq!(rx.recv().await.unwrap().content, "recovered");
    }

    #[tokio::test]
    async fn a_dead_connection_does_not_fail_the_remaining_deliveries() {
        let (store, rooms) = rooms_with_store();
        let sender = store.add_user("sender");
        let group = Uuid::new_v4();

        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        rooms.join(group, Uuid::new_v4(), dead_tx).await;
        rooms.join(group, Uuid::new_v4(), live_tx).await;
        drop(dead_rx);

        rooms.send_message(group, sender, "still here").await.unwrap();
        assert_eq!(live_rx.recv().await.unwrap().content, "still here");
    }

    #[tokio::test]
    async fn leaving_stops_delivery_and_messages_stay_room_scoped() {
        let (store, rooms) = rooms_with_store();
        let sender = store.add_user("sender");
        let group_a = Uuid::new_v4();
        let group_b = Uuid::new_v4();

        let conn = Uuid::new_v4();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        rooms.join(group_a, conn, tx_a).await;
        rooms.join(group_b, Uuid::new_v4(), tx_b).await;

        rooms.send_message(group_a, sender, "to a").await.unwrap();
        assert_eq!(rx_a.recv().await.unwrap().content, "to a");
        assert!(rx_b.try_recv().is_err());

        rooms.leave_all(conn).await;
        rooms.send_message(group_a, sender, "after leave").await.unwrap();
        // Give the room task a chance to process; the channel must stay empty.
        tokio::task::yield_now().await;
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn blank_messages_are_rejected_before_persistence() {
        let (store, rooms) = rooms_with_store();
        let sender = store.add_user("sender");
        let group = Uuid::new_v4();

        let err = rooms.send_message(group, sender, "   ").await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(store.messages_for_group(group, 10).await.unwrap().is_empty());
    }
}
