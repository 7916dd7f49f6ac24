//! Abstract persistence interfaces for pluggable datastores
//!
//! The coordinator hands every approved send to a `MessageStore` and
//! broadcasts the canonical record the store returns. Storage failures
//! abort the send; no partial broadcast occurs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::user::Rank;
use crate::error::Result;

/// Kind of relayed message content. Image and voice messages carry a URL to
/// externally-stored media; the media bytes never pass through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Voice,
    System,
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Text
    }
}

/// The persisted form of a message as returned by the datastore. This is
/// the payload broadcast to clients: the store assigns the id and timestamp
/// and denormalizes the sender's display fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub id: String,
    /// Room scope for room messages, `None` for private messages
    pub room_id: Option<String>,
    /// Receiver for private messages, `None` for room messages
    pub receiver_id: Option<String>,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_rank: Rank,
    pub content: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
}

/// Datastore interface consumed by the coordinator
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a room-scoped message and return its canonical record
    async fn save_room_message(
        &self,
        room_id: &str,
        sender_id: &str,
        sender_name: &str,
        sender_rank: Rank,
        content: &str,
        kind: MessageKind,
    ) -> Result<CanonicalMessage>;

    /// Persist a private message and return its canonical record
    async fn save_private_message(
        &self,
        receiver_id: &str,
        sender_id: &str,
        sender_name: &str,
        sender_rank: Rank,
        content: &str,
        kind: MessageKind,
    ) -> Result<CanonicalMessage>;

    /// Write a rank change through to the user store. The new rank takes
    /// effect for live sessions only on reconnect.
    async fn save_rank(&self, user_id: &str, rank: Rank) -> Result<()>;
}
