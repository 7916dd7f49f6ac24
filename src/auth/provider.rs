//! Pluggable authentication backends
//!
//! The coordinator never mints or inspects credentials itself; it hands the
//! presented token to an `AuthProvider` and acts on the result. Production
//! deployments plug in whatever backend issues their tokens; the bundled
//! `StaticTokenProvider` covers development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::auth::user::UserProfile;
use crate::error::Result;

/// An externally-issued ban that refuses authentication outright
#[derive(Debug, Clone)]
pub struct ActiveBan {
    pub reason: String,
    /// `None` means permanent
    pub expires_at: Option<DateTime<Utc>>,
}

/// Trait for authentication collaborators
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Verify a credential token. `Ok(None)` means the token is invalid;
    /// transport or backend failures surface as errors.
    async fn verify_token(&self, token: &str) -> Result<Option<UserProfile>>;

    /// Check whether the user store carries an active ban for this user
    async fn check_ban(&self, user_id: &str) -> Result<Option<ActiveBan>>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}

/// Token-table provider backed by an in-memory map
pub struct StaticTokenProvider {
    tokens: RwLock<HashMap<String, UserProfile>>,
    bans: RwLock<HashMap<String, ActiveBan>>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            bans: RwLock::new(HashMap::new()),
        }
    }

    /// Register a token for a user profile
    pub async fn insert_token(&self, token: impl Into<String>, profile: UserProfile) {
        self.tokens.write().await.insert(token.into(), profile);
    }

    /// Record an externally-issued ban for a user
    pub async fn insert_ban(&self, user_id: impl Into<String>, ban: ActiveBan) {
        self.bans.write().await.insert(user_id.into(), ban);
    }
}

impl Default for StaticTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for StaticTokenProvider {
    async fn verify_token(&self, token: &str) -> Result<Option<UserProfile>> {
        Ok(self.tokens.read().await.get(token).cloned())
    }

    async fn check_ban(&self, user_id: &str) -> Result<Option<ActiveBan>> {
        let bans = self.bans.read().await;
        match bans.get(user_id) {
            Some(ban) => {
                let active = match ban.expires_at {
                    Some(expiry) => Utc::now() < expiry,
                    None => true,
                };
                Ok(active.then(|| ban.clone()))
            }
            None => Ok(None),
        }
    }

    fn provider_name(&self) -> &'static str {
        "static_token"
    }
}
