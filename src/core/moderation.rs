//! Moderation state: append-only mute/ban records with expiry
//!
//! Records are never mutated after creation. The most recent record of a
//! kind is authoritative, which is also how a mute is lifted: a newer
//! record that is already expired supersedes the active one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Kind of moderation record. A ban refuses authentication; a mute refuses
/// individual sends but never connecting or reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationKind {
    Mute,
    Ban,
}

/// Named moderation durations, resolved to an absolute expiry when the
/// record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModerationSpan {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    TwentyFourHours,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "permanent")]
    Permanent,
}

impl ModerationSpan {
    /// Resolve to an absolute expiry; `None` means permanent
    pub fn expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ModerationSpan::FiveMinutes => Some(now + Duration::minutes(5)),
            ModerationSpan::OneHour => Some(now + Duration::hours(1)),
            ModerationSpan::TwentyFourHours => Some(now + Duration::hours(24)),
            ModerationSpan::SevenDays => Some(now + Duration::days(7)),
            ModerationSpan::Permanent => None,
        }
    }
}

/// A single mute or ban. `expiry` of `None` means permanent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationRecord {
    pub user_id: String,
    pub kind: ModerationKind,
    pub reason: String,
    pub issued_at: DateTime<Utc>,
    pub expiry: Option<DateTime<Utc>>,
}

impl ModerationRecord {
    pub fn new(
        user_id: impl Into<String>,
        kind: ModerationKind,
        reason: impl Into<String>,
        issued_at: DateTime<Utc>,
        span: ModerationSpan,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            reason: reason.into(),
            issued_at,
            expiry: span.expiry_from(issued_at),
        }
    }

    /// A record that is expired from the moment it is issued. Appending one
    /// supersedes any active record of the same kind, lifting it.
    pub fn lifted(user_id: impl Into<String>, kind: ModerationKind, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            reason: "lifted".to_string(),
            issued_at: now,
            expiry: Some(now),
        }
    }

    fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now < expiry,
            None => true,
        }
    }
}

/// Append-only per-user moderation records
pub struct ModerationState {
    records: RwLock<HashMap<String, Vec<ModerationRecord>>>,
}

impl ModerationState {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Append a record. Prior records are superseded by recency, never
    /// revoked or merged.
    pub async fn apply(&self, record: ModerationRecord) {
        let mut records = self.records.write().await;
        records.entry(record.user_id.clone()).or_default().push(record);
    }

    /// Whether the most recent record of the given kind is active at `now`
    pub async fn is_active(&self, user_id: &str, kind: ModerationKind, now: DateTime<Utc>) -> bool {
        let records = self.records.read().await;
        records
            .get(user_id)
            .and_then(|user_records| {
                user_records
                    .iter()
                    .filter(|r| r.kind == kind)
                    .max_by_key(|r| r.issued_at)
            })
            .map(|r| r.is_active(now))
            .unwrap_or(false)
    }

    /// Physically drop records that can no longer influence `is_active`.
    /// A cleanliness optimization only; `is_active` re-checks expiry on
    /// every call regardless, and the sweep must never change its answer.
    ///
    /// Records are dropped a kind at a time: once the most recent record
    /// of a kind has expired, that kind reports inactive forever (newer
    /// records can only be appended later), so the whole kind can go. An
    /// expired record that is still the newest of its kind is never
    /// dropped alone; removing just it would hand authority back to an
    /// older record it superseded, resurrecting a lifted sanction.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) {
        let mut records = self.records.write().await;
        records.retain(|_, user_records| {
            let mute_active = newest_is_active(user_records, ModerationKind::Mute, now);
            let ban_active = newest_is_active(user_records, ModerationKind::Ban, now);
            user_records.retain(|r| {
                let kind_active = match r.kind {
                    ModerationKind::Mute => mute_active,
                    ModerationKind::Ban => ban_active,
                };
                kind_active && r.is_active(now)
            });
            !user_records.is_empty()
        });
    }

    /// Number of records currently held, across all users
    pub async fn record_count(&self) -> usize {
        self.records.read().await.values().map(Vec::len).sum()
    }

    /// All records for a user, oldest first
    pub async fn records_for(&self, user_id: &str) -> Vec<ModerationRecord> {
        self.records
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for ModerationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the most recent record of a kind is active at `now`
fn newest_is_active(records: &[ModerationRecord], kind: ModerationKind, now: DateTime<Utc>) -> bool {
    records
        .iter()
        .filter(|r| r.kind == kind)
        .max_by_key(|r| r.issued_at)
        .map(|r| r.is_active(now))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timed_mute_expires_at_boundary() {
        let state = ModerationState::new();
        let t0 = Utc::now();
        state
            .apply(ModerationRecord::new(
                "5",
                ModerationKind::Mute,
                "spam",
                t0,
                ModerationSpan::OneHour,
            ))
            .await;

        assert!(state.is_active("5", ModerationKind::Mute, t0 + Duration::seconds(3599)).await);
        assert!(!state.is_active("5", ModerationKind::Mute, t0 + Duration::seconds(3601)).await);
    }

    #[tokio::test]
    async fn test_permanent_record_never_expires() {
        let state = ModerationState::new();
        let t0 = Utc::now();
        state
            .apply(ModerationRecord::new(
                "u1",
                ModerationKind::Ban,
                "abuse",
                t0,
                ModerationSpan::Permanent,
            ))
            .await;

        assert!(state.is_active("u1", ModerationKind::Ban, t0 + Duration::days(365)).await);
    }

    #[tokio::test]
    async fn test_kinds_are_independent() {
        let state = ModerationState::new();
        let t0 = Utc::now();
        state
            .apply(ModerationRecord::new(
                "u1",
                ModerationKind::Mute,
                "spam",
                t0,
                ModerationSpan::FiveMinutes,
            ))
            .await;

        assert!(state.is_active("u1", ModerationKind::Mute, t0).await);
        assert!(!state.is_active("u1", ModerationKind::Ban, t0).await);
    }

    #[tokio::test]
    async fn test_lift_supersedes_permanent_mute() {
        let state = ModerationState::new();
        let t0 = Utc::now();
        state
            .apply(ModerationRecord::new(
                "u1",
                ModerationKind::Mute,
                "abuse",
                t0,
                ModerationSpan::Permanent,
            ))
            .await;
        assert!(state.is_active("u1", ModerationKind::Mute, t0 + Duration::hours(1)).await);

        state
            .apply(ModerationRecord::lifted(
                "u1",
                ModerationKind::Mute,
                t0 + Duration::hours(2),
            ))
            .await;
        assert!(!state.is_active("u1", ModerationKind::Mute, t0 + Duration::hours(3)).await);
    }

    #[tokio::test]
    async fn test_sweep_drops_expired_keeps_permanent() {
        let state = ModerationState::new();
        let t0 = Utc::now();
        state
            .apply(ModerationRecord::new(
                "u1",
                ModerationKind::Mute,
                "spam",
                t0,
                ModerationSpan::FiveMinutes,
            ))
            .await;
        state
            .apply(ModerationRecord::new(
                "u2",
                ModerationKind::Ban,
                "abuse",
                t0,
                ModerationSpan::Permanent,
            ))
            .await;

        state.sweep_expired(t0 + Duration::minutes(10)).await;
        assert_eq!(state.record_count().await, 1);
        assert!(state.is_active("u2", ModerationKind::Ban, t0 + Duration::minutes(10)).await);
    }

    #[tokio::test]
    async fn test_sweep_preserves_lifted_state() {
        let state = ModerationState::new();
        let t0 = Utc::now();
        state
            .apply(ModerationRecord::new(
                "u1",
                ModerationKind::Mute,
                "abuse",
                t0,
                ModerationSpan::Permanent,
            ))
            .await;
        state
            .apply(ModerationRecord::lifted(
                "u1",
                ModerationKind::Mute,
                t0 + Duration::hours(1),
            ))
            .await;
        assert!(!state.is_active("u1", ModerationKind::Mute, t0 + Duration::hours(2)).await);

        // The sweep must not hand authority back to the permanent record
        state.sweep_expired(t0 + Duration::hours(2)).await;
        assert!(!state.is_active("u1", ModerationKind::Mute, t0 + Duration::hours(2)).await);
        assert_eq!(state.record_count().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_drops_kind_whose_newest_record_expired() {
        let state = ModerationState::new();
        let t0 = Utc::now();
        state
            .apply(ModerationRecord::new(
                "u1",
                ModerationKind::Mute,
                "spam",
                t0,
                ModerationSpan::OneHour,
            ))
            .await;
        state
            .apply(ModerationRecord::new(
                "u1",
                ModerationKind::Mute,
                "spam again",
                t0 + Duration::minutes(1),
                ModerationSpan::FiveMinutes,
            ))
            .await;

        // The newer 5-minute mute is authoritative and has expired; the
        // older unexpired mute it superseded must not come back
        let t = t0 + Duration::minutes(10);
        assert!(!state.is_active("u1", ModerationKind::Mute, t).await);
        state.sweep_expired(t).await;
        assert!(!state.is_active("u1", ModerationKind::Mute, t).await);
        assert_eq!(state.record_count().await, 0);
    }
}
