//! Simple in-memory datastore
//!
//! Keeps canonical records in a bounded buffer. Suitable for development
//! and tests; production deployments plug in a real datastore behind the
//! same trait.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::user::Rank;
use crate::error::Result;
use crate::storage::traits::{CanonicalMessage, MessageKind, MessageStore};

/// Maximum number of records kept in memory
const DEFAULT_MAX_MESSAGES: usize = 1000;

pub struct MemoryStore {
    messages: Mutex<VecDeque<CanonicalMessage>>,
    ranks: Mutex<HashMap<String, Rank>>,
    max_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_MESSAGES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::with_capacity(capacity)),
            ranks: Mutex::new(HashMap::new()),
            max_size: capacity,
        }
    }

    async fn push(&self, message: CanonicalMessage) {
        let mut messages = self.messages.lock().await;
        if messages.len() >= self.max_size {
            messages.pop_front();
        }
        messages.push_back(message);
    }

    /// Number of stored records
    pub async fn count(&self) -> usize {
        self.messages.lock().await.len()
    }

    /// Most recent records, oldest first
    pub async fn recent_messages(&self, limit: usize) -> Vec<CanonicalMessage> {
        let messages = self.messages.lock().await;
        let skip = messages.len().saturating_sub(limit);
        messages.iter().skip(skip).cloned().collect()
    }

    /// Rank last written for a user, if any
    pub async fn rank_of(&self, user_id: &str) -> Option<Rank> {
        self.ranks.lock().await.get(user_id).copied()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn save_room_message(
        &self,
        room_id: &str,
        sender_id: &str,
        sender_name: &str,
        sender_rank: Rank,
        content: &str,
        kind: MessageKind,
    ) -> Result<CanonicalMessage> {
        let record = CanonicalMessage {
            id: Uuid::new_v4().to_string(),
            room_id: Some(room_id.to_string()),
            receiver_id: None,
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            sender_rank,
            content: content.to_string(),
            kind,
            timestamp: Utc::now(),
        };
        self.push(record.clone()).await;
        Ok(record)
    }

    async fn save_private_message(
        &self,
        receiver_id: &str,
        sender_id: &str,
        sender_name: &str,
        sender_rank: Rank,
        content: &str,
        kind: MessageKind,
    ) -> Result<CanonicalMessage> {
        let record = CanonicalMessage {
            id: Uuid::new_v4().to_string(),
            room_id: None,
            receiver_id: Some(receiver_id.to_string()),
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            sender_rank,
            content: content.to_string(),
            kind,
            timestamp: Utc::now(),
        };
        self.push(record.clone()).await;
        Ok(record)
    }

    async fn save_rank(&self, user_id: &str, rank: Rank) -> Result<()> {
        self.ranks.lock().await.insert(user_id.to_string(), rank);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_assigns_id_and_timestamp() {
        let store = MemoryStore::new();
        let record = store
            .save_room_message("room-1", "u1", "alice", Rank::Visitor, "hello", MessageKind::Text)
            .await
            .unwrap();

        assert!(!record.id.is_empty());
        assert_eq!(record.room_id.as_deref(), Some("room-1"));
        assert!(record.receiver_id.is_none());
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let store = MemoryStore::with_capacity(2);
        for i in 0..3 {
            store
                .save_room_message("r", "u1", "alice", Rank::Visitor, &format!("m{}", i), MessageKind::Text)
                .await
                .unwrap();
        }
        let recent = store.recent_messages(10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "m1");
    }
}
