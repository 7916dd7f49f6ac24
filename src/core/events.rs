//! Wire event vocabulary for the relay transport

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::user::Rank;
use crate::core::moderation::{ModerationKind, ModerationSpan};
use crate::storage::traits::{CanonicalMessage, MessageKind};

/// Client-to-server events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Present a credential token; must be the first event on a connection
    #[serde(rename = "authenticate")]
    Authenticate { token: String },

    /// Join a room, implicitly leaving the previous one
    #[serde(rename = "join")]
    Join { room_id: String },

    /// Send a message to the connection's current room
    #[serde(rename = "send_message")]
    SendMessage {
        room_id: String,
        content: String,
        #[serde(default)]
        kind: MessageKind,
    },

    /// Send a private message to another user
    #[serde(rename = "send_private_message")]
    SendPrivateMessage {
        receiver_id: String,
        content: String,
        #[serde(default)]
        kind: MessageKind,
    },

    /// Explicit disconnect
    #[serde(rename = "disconnect")]
    Disconnect,

    /// Ban a user (admin and above)
    #[serde(rename = "ban")]
    Ban {
        user_id: String,
        reason: String,
        duration: ModerationSpan,
    },

    /// Mute a user (moderator and above)
    #[serde(rename = "mute")]
    Mute {
        user_id: String,
        reason: String,
        duration: ModerationSpan,
    },

    /// Lift a user's active mute (moderator and above)
    #[serde(rename = "unmute")]
    Unmute { user_id: String },

    /// Change a user's rank (admin and above); takes effect on reconnect
    #[serde(rename = "assign_rank")]
    AssignRank { user_id: String, rank: Rank },
}

/// Server-to-client events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Connection accepted, not yet authenticated
    #[serde(rename = "connected")]
    Connected { connection_id: String },

    /// Authentication succeeded on this connection
    #[serde(rename = "authenticated")]
    Authenticated {
        user_id: String,
        display_name: String,
        rank: Rank,
    },

    /// A user came online or went offline
    #[serde(rename = "presence")]
    Presence {
        user_id: String,
        display_name: String,
        online: bool,
        timestamp: DateTime<Utc>,
    },

    /// Canonical room message
    #[serde(rename = "new_message")]
    NewMessage { message: CanonicalMessage },

    /// Canonical private message
    #[serde(rename = "new_private_message")]
    NewPrivateMessage { message: CanonicalMessage },

    /// Room-scoped system notice (e.g. flood mute announcements)
    #[serde(rename = "system_notice")]
    SystemNotice {
        room_id: Option<String>,
        content: String,
        timestamp: DateTime<Utc>,
    },

    /// A moderation action took effect
    #[serde(rename = "moderation_notice")]
    ModerationNotice {
        user_id: String,
        kind: ModerationKind,
        reason: String,
        duration: ModerationSpan,
    },

    /// A user's stored profile changed (e.g. rank reassignment)
    #[serde(rename = "user_updated")]
    UserUpdated { user_id: String, rank: Rank },

    /// Error reported to the offending connection only
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl ServerEvent {
    /// Serialize for the wire. Event payloads are plain data; a failure
    /// here is a programming defect and is logged, with a generic error
    /// payload sent in place of the event.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::error!("Failed to serialize server event: {}", e);
            r#"{"type":"error","code":"INTERNAL","message":"serialization failure"}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_tagging() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"join","room_id":"lobby"}"#).unwrap();
        match event {
            ClientEvent::Join { room_id } => assert_eq!(room_id, "lobby"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_send_message_kind_defaults_to_text() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"send_message","room_id":"7","content":"hi"}"#)
                .unwrap();
        match event {
            ClientEvent::SendMessage { kind, .. } => assert_eq!(kind, MessageKind::Text),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_moderation_duration_names() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"mute","user_id":"5","reason":"spam","duration":"1h"}"#,
        )
        .unwrap();
        match event {
            ClientEvent::Mute { duration, .. } => {
                assert_eq!(duration, ModerationSpan::OneHour)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
