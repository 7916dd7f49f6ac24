//! Presence registry: who is connected, and in which room
//!
//! Source of truth for "who is online". All three indexes (connection,
//! user, room) live behind a single lock so a broadcast snapshot never
//! observes a partially-registered or partially-removed connection.

use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use warp::ws::Message;

use crate::core::connection::{Connection, ConnectionId};
use crate::error::{RelayError, Result};

struct PresenceEntry {
    user_id: String,
    room_id: Option<String>,
    sender: tokio::sync::mpsc::UnboundedSender<Message>,
}

#[derive(Default)]
struct PresenceIndexes {
    connections: HashMap<ConnectionId, PresenceEntry>,
    by_user: HashMap<String, HashSet<ConnectionId>>,
    by_room: HashMap<String, HashSet<ConnectionId>>,
}

/// Registry of authenticated connections and their room membership
pub struct PresenceRegistry {
    inner: RwLock<PresenceIndexes>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(PresenceIndexes::default()),
        }
    }

    /// Register an authenticated connection for a user. Multiple
    /// connections per user are permitted (multi-device); registering the
    /// same connection handle twice is a caller bug.
    pub async fn register(&self, user_id: &str, connection: &Connection) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.connections.contains_key(&connection.id) {
            return Err(RelayError::AlreadyRegistered(connection.id.to_string()));
        }
        inner.connections.insert(
            connection.id,
            PresenceEntry {
                user_id: user_id.to_string(),
                room_id: None,
                sender: connection.sender.clone(),
            },
        );
        inner
            .by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(connection.id);
        Ok(())
    }

    /// Move a connection into a room, leaving any previous room. Returns
    /// the previous room id, if any.
    pub async fn set_room(&self, connection_id: ConnectionId, room_id: &str) -> Result<Option<String>> {
        let mut inner = self.inner.write().await;
        let previous = {
            let entry = inner
                .connections
                .get_mut(&connection_id)
                .ok_or_else(|| RelayError::SessionNotFound(connection_id.to_string()))?;
            entry.room_id.replace(room_id.to_string())
        };
        if let Some(ref prev) = previous {
            if let Some(members) = inner.by_room.get_mut(prev) {
                members.remove(&connection_id);
                if members.is_empty() {
                    inner.by_room.remove(prev);
                }
            }
        }
        inner
            .by_room
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id);
        Ok(previous)
    }

    /// Remove a connection from every index. Returns the owning user id and
    /// whether this was the user's last connection; `None` if the
    /// connection was not registered (already unregistered is not an error,
    /// disconnect must be idempotent).
    pub async fn unregister(&self, connection_id: ConnectionId) -> Option<(String, bool)> {
        let mut inner = self.inner.write().await;
        let entry = inner.connections.remove(&connection_id)?;
        if let Some(ref room) = entry.room_id {
            if let Some(members) = inner.by_room.get_mut(room) {
                members.remove(&connection_id);
                if members.is_empty() {
                    inner.by_room.remove(room);
                }
            }
        }
        let last = match inner.by_user.get_mut(&entry.user_id) {
            Some(conns) => {
                conns.remove(&connection_id);
                if conns.is_empty() {
                    inner.by_user.remove(&entry.user_id);
                    true
                } else {
                    false
                }
            }
            None => true,
        };
        Some((entry.user_id, last))
    }

    /// Current room of a connection
    pub async fn room_of(&self, connection_id: ConnectionId) -> Option<String> {
        let inner = self.inner.read().await;
        inner
            .connections
            .get(&connection_id)
            .and_then(|e| e.room_id.clone())
    }

    /// Snapshot of the outbound senders for every connection of a user
    pub async fn connections_for(
        &self,
        user_id: &str,
    ) -> Vec<(ConnectionId, tokio::sync::mpsc::UnboundedSender<Message>)> {
        let inner = self.inner.read().await;
        inner
            .by_user
            .get(user_id)
            .map(|conns| {
                conns
                    .iter()
                    .filter_map(|id| inner.connections.get(id).map(|e| (*id, e.sender.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of the outbound senders for every connection in a room
    pub async fn connections_in_room(
        &self,
        room_id: &str,
    ) -> Vec<(ConnectionId, tokio::sync::mpsc::UnboundedSender<Message>)> {
        let inner = self.inner.read().await;
        inner
            .by_room
            .get(room_id)
            .map(|conns| {
                conns
                    .iter()
                    .filter_map(|id| inner.connections.get(id).map(|e| (*id, e.sender.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of every registered connection's sender
    pub async fn all_connections(
        &self,
    ) -> Vec<(ConnectionId, tokio::sync::mpsc::UnboundedSender<Message>)> {
        let inner = self.inner.read().await;
        inner
            .connections
            .iter()
            .map(|(id, e)| (*id, e.sender.clone()))
            .collect()
    }

    /// Whether the user has at least one registered connection
    pub async fn is_online(&self, user_id: &str) -> bool {
        self.inner.read().await.by_user.contains_key(user_id)
    }

    /// Number of registered connections
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn new_connection() -> Connection {
        let (tx, _rx) = mpsc::unbounded_channel();
        Connection::new(tx)
    }

    #[tokio::test]
    async fn test_double_register_rejected() {
        let registry = PresenceRegistry::new();
        let conn = new_connection();
        registry.register("u1", &conn).await.unwrap();
        assert!(matches!(
            registry.register("u1", &conn).await,
            Err(RelayError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn test_set_room_moves_not_duplicates() {
        let registry = PresenceRegistry::new();
        let conn = new_connection();
        registry.register("u1", &conn).await.unwrap();

        assert_eq!(registry.set_room(conn.id, "a").await.unwrap(), None);
        let previous = registry.set_room(conn.id, "b").await.unwrap();
        assert_eq!(previous.as_deref(), Some("a"));

        assert_eq!(registry.room_of(conn.id).await.as_deref(), Some("b"));
        assert!(registry.connections_in_room("a").await.is_empty());
        assert_eq!(registry.connections_in_room("b").await.len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_clears_every_index() {
        let registry = PresenceRegistry::new();
        let first = new_connection();
        let second = new_connection();
        registry.register("u1", &first).await.unwrap();
        registry.register("u1", &second).await.unwrap();
        registry.set_room(first.id, "lobby").await.unwrap();

        let (user, last) = registry.unregister(first.id).await.unwrap();
        assert_eq!(user, "u1");
        assert!(!last, "second device still connected");
        assert!(registry.room_of(first.id).await.is_none());
        assert!(registry.connections_in_room("lobby").await.is_empty());

        let (_, last) = registry.unregister(second.id).await.unwrap();
        assert!(last);
        assert!(!registry.is_online("u1").await);
        assert!(registry.unregister(second.id).await.is_none());
    }
}
