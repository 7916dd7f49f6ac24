//! Flood control: per-user sliding-window send limiting
//!
//! A fixed-window-with-prune approximation of a sliding window. Exact
//! fairness is not required here, only abuse damping, so this stays a
//! timestamp list rather than a token bucket.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::constants::{FLOOD_MAX_MESSAGES, FLOOD_RETENTION_SECS, FLOOD_WINDOW_SECS};

/// Outcome of a flood check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodDecision {
    Allowed,
    Flooded,
}

/// Per-user send-rate limiter
pub struct FloodGuard {
    windows: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
    max_messages: usize,
    window: Duration,
    retention: Duration,
}

impl FloodGuard {
    pub fn new() -> Self {
        Self::with_limits(FLOOD_MAX_MESSAGES, FLOOD_WINDOW_SECS)
    }

    pub fn with_limits(max_messages: usize, window_secs: i64) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            max_messages,
            window: Duration::seconds(window_secs),
            retention: Duration::seconds(FLOOD_RETENTION_SECS),
        }
    }

    /// Prune the user's window, then either record this send or refuse it.
    /// A refused send is itself not recorded, so a flooded user's window
    /// drains on its own once they stop sending.
    pub async fn check_and_record(&self, user_id: &str, now: DateTime<Utc>) -> FloodDecision {
        let mut windows = self.windows.write().await;
        let window = windows.entry(user_id.to_string()).or_default();
        let cutoff = now - self.window;
        window.retain(|&t| t > cutoff);

        if window.len() >= self.max_messages {
            FloodDecision::Flooded
        } else {
            window.push(now);
            FloodDecision::Allowed
        }
    }

    /// Drop windows with no sends inside the retention interval, bounding
    /// memory to active senders. Runs on the periodic sweep timer.
    pub async fn sweep(&self, now: DateTime<Utc>) {
        let cutoff = now - self.retention;
        let mut windows = self.windows.write().await;
        windows.retain(|_, times| {
            times.retain(|&t| t > cutoff);
            !times.is_empty()
        });
    }

    /// Number of users currently tracked
    pub async fn tracked_users(&self) -> usize {
        self.windows.read().await.len()
    }
}

impl Default for FloodGuard {
    fn default() -> Self {
        Self::new()
    }
}
