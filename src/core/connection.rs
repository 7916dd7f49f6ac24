//! Client connection handles
//! One handle per open WebSocket, created on transport accept

use log::warn;
use std::time::Instant;
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::Message;

/// Unique identifier of a single open connection
pub type ConnectionId = Uuid;

/// An open duplex channel to one client. The handle identifies exactly one
/// user session once authenticated; before that the owning user is unknown.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub sender: mpsc::UnboundedSender<Message>,
    pub connected_at: Instant,
}

impl Connection {
    /// Create a new connection handle with a unique ID
    pub fn new(sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            connected_at: Instant::now(),
        }
    }

    /// Send a text frame through this connection. A failed send means the
    /// peer is gone; callers treat it as a skipped delivery, not an error.
    pub fn send_text(&self, text: &str) -> bool {
        match self.sender.send(Message::text(text)) {
            Ok(_) => true,
            Err(_) => {
                warn!("Failed to send to connection {}", self.id);
                false
            }
        }
    }
}
