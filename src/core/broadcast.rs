//! Room broadcaster: fan-out of server events over presence snapshots
//!
//! Delivery targets are whatever the presence registry lists at call time.
//! A dead connection is skipped with a warning and never aborts delivery to
//! the rest.

use log::{debug, warn};
use std::sync::Arc;
use warp::ws::Message;

use crate::core::events::ServerEvent;
use crate::core::presence::PresenceRegistry;

pub struct RoomBroadcaster {
    presence: Arc<PresenceRegistry>,
}

impl RoomBroadcaster {
    pub fn new(presence: Arc<PresenceRegistry>) -> Self {
        Self { presence }
    }

    /// Deliver an event to every connection currently in a room. Returns
    /// the number of successful sends.
    pub async fn to_room(&self, room_id: &str, event: &ServerEvent) -> usize {
        let targets = self.presence.connections_in_room(room_id).await;
        let delivered = self.deliver(targets, event);
        debug!("Broadcast to room {}: {} connections reached", room_id, delivered);
        delivered
    }

    /// Deliver an event to every connection of a user (multi-device
    /// fan-out). An offline user means the event is silently dropped; this
    /// is not a durable outbox.
    pub async fn to_user(&self, user_id: &str, event: &ServerEvent) -> usize {
        let targets = self.presence.connections_for(user_id).await;
        self.deliver(targets, event)
    }

    /// Deliver an event to every registered connection
    pub async fn to_all(&self, event: &ServerEvent) -> usize {
        let targets = self.presence.all_connections().await;
        let delivered = self.deliver(targets, event);
        debug!("Global broadcast: {} connections reached", delivered);
        delivered
    }

    fn deliver(
        &self,
        targets: Vec<(
            crate::core::connection::ConnectionId,
            tokio::sync::mpsc::UnboundedSender<Message>,
        )>,
        event: &ServerEvent,
    ) -> usize {
        let payload = event.to_json();
        let mut delivered = 0;
        for (id, sender) in targets {
            if sender.send(Message::text(payload.clone())).is_ok() {
                delivered += 1;
            } else {
                warn!("Dropping delivery to dead connection {}", id);
            }
        }
        delivered
    }
}
