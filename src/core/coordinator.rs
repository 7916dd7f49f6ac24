//! Connection coordinator: the per-event orchestration pipeline
//!
//! Ties presence, flood control, moderation and broadcast together. Every
//! inbound client event runs validation, then the gatekeepers, then the
//! persistence hand-off, then fan-out. No internal lock is held across a
//! collaborator await: state is snapshotted, the lock released, and
//! re-checked after the call where it matters.

use chrono::{Duration, Utc};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::interval;

use crate::auth::provider::AuthProvider;
use crate::auth::user::Rank;
use crate::config::RelayConfig;
use crate::core::broadcast::RoomBroadcaster;
use crate::core::connection::{Connection, ConnectionId};
use crate::core::events::{ClientEvent, ServerEvent};
use crate::core::moderation::{ModerationKind, ModerationRecord, ModerationSpan, ModerationState};
use crate::core::presence::PresenceRegistry;
use crate::core::rate_limiter::{FloodDecision, FloodGuard};
use crate::error::{RelayError, Result};
use crate::storage::traits::{CanonicalMessage, MessageKind, MessageStore};

/// Identity bound to a connection at authentication time. The rank is read
/// once from the user store and stays fixed until reconnect.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub user_id: String,
    pub display_name: String,
    pub rank: Rank,
}

/// Lifecycle state of one connection. `Closed` is terminal and represented
/// by removal from the state table, which is what makes disconnect
/// idempotent.
#[derive(Debug, Clone)]
enum ConnState {
    Unauthenticated,
    Authenticated(SessionInfo),
    InRoom(SessionInfo, String),
}

pub struct Coordinator {
    config: RelayConfig,
    presence: Arc<PresenceRegistry>,
    broadcaster: RoomBroadcaster,
    floods: FloodGuard,
    moderation: ModerationState,
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn MessageStore>,
    states: RwLock<HashMap<ConnectionId, ConnState>>,
}

impl Coordinator {
    pub fn new(
        config: RelayConfig,
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        let presence = Arc::new(PresenceRegistry::new());
        Self {
            broadcaster: RoomBroadcaster::new(presence.clone()),
            floods: FloodGuard::with_limits(config.flood_max_messages, config.flood_window_secs),
            moderation: ModerationState::new(),
            presence,
            auth,
            store,
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a freshly accepted transport connection as unauthenticated
    pub async fn connect(&self, connection: &Connection) {
        self.states
            .write()
            .await
            .insert(connection.id, ConnState::Unauthenticated);
        info!("Connection accepted: {}", connection.id);
    }

    /// Dispatch one inbound client event. Errors are terminal only to this
    /// operation; the caller reports them to the sender.
    pub async fn handle_event(&self, connection: &Connection, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::Authenticate { token } => {
                let session = self.authenticate(connection, &token).await?;
                connection.send_text(
                    &ServerEvent::Authenticated {
                        user_id: session.user_id,
                        display_name: session.display_name,
                        rank: session.rank,
                    }
                    .to_json(),
                );
                Ok(())
            }
            ClientEvent::Join { room_id } => self.join(connection, &room_id).await,
            ClientEvent::SendMessage {
                room_id,
                content,
                kind,
            } => self
                .send_message(connection, &room_id, &content, kind)
                .await
                .map(|_| ()),
            ClientEvent::SendPrivateMessage {
                receiver_id,
                content,
                kind,
            } => self
                .send_private_message(connection, &receiver_id, &content, kind)
                .await
                .map(|_| ()),
            ClientEvent::Disconnect => self.disconnect(connection.id).await,
            ClientEvent::Ban {
                user_id,
                reason,
                duration,
            } => self.ban_user(connection, &user_id, &reason, duration).await,
            ClientEvent::Mute {
                user_id,
                reason,
                duration,
            } => self.mute_user(connection, &user_id, &reason, duration).await,
            ClientEvent::Unmute { user_id } => self.unmute_user(connection, &user_id).await,
            ClientEvent::AssignRank { user_id, rank } => {
                self.assign_rank(connection, &user_id, rank).await
            }
        }
    }

    /// Authenticate a connection. On success the connection is registered
    /// with the presence registry and a presence-online event goes out; a
    /// banned user is refused and the connection closed.
    pub async fn authenticate(&self, connection: &Connection, token: &str) -> Result<SessionInfo> {
        match self.state_of(connection.id).await {
            Some(ConnState::Unauthenticated) => {}
            Some(_) => {
                return Err(RelayError::InvalidState(
                    "connection is already authenticated".to_string(),
                ))
            }
            None => return Err(RelayError::ConnectionClosed),
        }

        // Collaborator hand-off happens with no internal lock held
        let profile = self
            .auth
            .verify_token(token)
            .await?
            .ok_or(RelayError::InvalidToken)?;

        if let Some(ban) = self.auth.check_ban(&profile.user_id).await? {
            warn!(
                "Refusing banned user {} on connection {} ({})",
                profile.user_id, connection.id, ban.reason
            );
            self.states.write().await.remove(&connection.id);
            return Err(RelayError::Banned);
        }
        if self
            .moderation
            .is_active(&profile.user_id, ModerationKind::Ban, Utc::now())
            .await
        {
            self.states.write().await.remove(&connection.id);
            return Err(RelayError::Banned);
        }

        // Re-validate: the transport may have closed during the lookups
        {
            let mut states = self.states.write().await;
            match states.get(&connection.id) {
                Some(ConnState::Unauthenticated) => {}
                _ => return Err(RelayError::ConnectionClosed),
            }
            states.insert(
                connection.id,
                ConnState::Authenticated(SessionInfo {
                    user_id: profile.user_id.clone(),
                    display_name: profile.display_name.clone(),
                    rank: profile.rank,
                }),
            );
        }
        self.presence.register(&profile.user_id, connection).await?;

        // A disconnect may have raced the registration: it found no
        // presence entry to remove, so the rollback is on us
        {
            let states = self.states.read().await;
            if !states.contains_key(&connection.id) {
                drop(states);
                self.presence.unregister(connection.id).await;
                return Err(RelayError::ConnectionClosed);
            }
        }
        info!("Connection {} authenticated as {}", connection.id, profile.user_id);

        self.broadcaster
            .to_all(&ServerEvent::Presence {
                user_id: profile.user_id.clone(),
                display_name: profile.display_name.clone(),
                online: true,
                timestamp: Utc::now(),
            })
            .await;

        Ok(SessionInfo {
            user_id: profile.user_id,
            display_name: profile.display_name,
            rank: profile.rank,
        })
    }

    /// Move the connection into a room, implicitly leaving the previous
    /// one. Membership changes are not announced chat-wide; only presence
    /// online/offline is.
    pub async fn join(&self, connection: &Connection, room_id: &str) -> Result<()> {
        let session = match self.state_of(connection.id).await {
            Some(ConnState::Authenticated(s)) | Some(ConnState::InRoom(s, _)) => s,
            Some(ConnState::Unauthenticated) => {
                return Err(RelayError::InvalidState(
                    "join requires authentication".to_string(),
                ))
            }
            None => return Err(RelayError::ConnectionClosed),
        };

        self.presence.set_room(connection.id, room_id).await?;
        self.states
            .write()
            .await
            .insert(connection.id, ConnState::InRoom(session, room_id.to_string()));
        Ok(())
    }

    /// Room send pipeline: flood check, mute check, persistence hand-off,
    /// then broadcast of the canonical record.
    pub async fn send_message(
        &self,
        connection: &Connection,
        room_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<CanonicalMessage> {
        self.validate_content(content)?;
        let session = match self.state_of(connection.id).await {
            Some(ConnState::InRoom(s, current)) if current == room_id => s,
            Some(ConnState::InRoom(_, current)) => {
                return Err(RelayError::InvalidState(format!(
                    "connection is in room {}, not {}",
                    current, room_id
                )))
            }
            Some(_) => {
                return Err(RelayError::InvalidState(
                    "sending requires joining a room first".to_string(),
                ))
            }
            None => return Err(RelayError::ConnectionClosed),
        };

        let now = Utc::now();
        if self.floods.check_and_record(&session.user_id, now).await == FloodDecision::Flooded {
            // An already-muted flooder gets the mute error, not a second record
            if self
                .moderation
                .is_active(&session.user_id, ModerationKind::Mute, now)
                .await
            {
                return Err(RelayError::Muted);
            }
            self.moderation
                .apply(ModerationRecord {
                    user_id: session.user_id.clone(),
                    kind: ModerationKind::Mute,
                    reason: "flood".to_string(),
                    issued_at: now,
                    expiry: Some(now + Duration::seconds(self.config.flood_auto_mute_secs)),
                })
                .await;
            warn!("Auto-muted {} for flooding", session.user_id);
            self.broadcaster
                .to_room(
                    room_id,
                    &ServerEvent::SystemNotice {
                        room_id: Some(room_id.to_string()),
                        content: format!("{} has been muted for flooding", session.display_name),
                        timestamp: now,
                    },
                )
                .await;
            return Err(RelayError::Flooded);
        }

        if self
            .moderation
            .is_active(&session.user_id, ModerationKind::Mute, now)
            .await
        {
            return Err(RelayError::Muted);
        }

        let record = self
            .store
            .save_room_message(
                room_id,
                &session.user_id,
                &session.display_name,
                session.rank,
                content,
                kind,
            )
            .await?;

        self.broadcaster
            .to_room(room_id, &ServerEvent::NewMessage { message: record.clone() })
            .await;
        Ok(record)
    }

    /// Private send pipeline: mutes apply symmetrically, the persisted
    /// record fans out to every device of the receiver and echoes to every
    /// device of the sender.
    pub async fn send_private_message(
        &self,
        connection: &Connection,
        receiver_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<CanonicalMessage> {
        self.validate_content(content)?;
        let session = match self.state_of(connection.id).await {
            Some(ConnState::Authenticated(s)) | Some(ConnState::InRoom(s, _)) => s,
            Some(ConnState::Unauthenticated) => {
                return Err(RelayError::InvalidState(
                    "private messages require authentication".to_string(),
                ))
            }
            None => return Err(RelayError::ConnectionClosed),
        };

        if self
            .moderation
            .is_active(&session.user_id, ModerationKind::Mute, Utc::now())
            .await
        {
            return Err(RelayError::Muted);
        }

        let record = self
            .store
            .save_private_message(
                receiver_id,
                &session.user_id,
                &session.display_name,
                session.rank,
                content,
                kind,
            )
            .await?;

        let event = ServerEvent::NewPrivateMessage { message: record.clone() };
        if receiver_id != session.user_id {
            self.broadcaster.to_user(receiver_id, &event).await;
        }
        self.broadcaster.to_user(&session.user_id, &event).await;
        Ok(record)
    }

    /// Close a connection. Idempotent: only the call that actually removes
    /// state unregisters presence, and the offline event goes out only when
    /// the user's last connection is gone.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<()> {
        let previous = self.states.write().await.remove(&connection_id);
        let session = match previous {
            Some(ConnState::Authenticated(s)) | Some(ConnState::InRoom(s, _)) => s,
            Some(ConnState::Unauthenticated) | None => return Ok(()),
        };

        if let Some((user_id, last)) = self.presence.unregister(connection_id).await {
            info!("Connection {} closed for {}", connection_id, user_id);
            if last {
                self.broadcaster
                    .to_all(&ServerEvent::Presence {
                        user_id,
                        display_name: session.display_name,
                        online: false,
                        timestamp: Utc::now(),
                    })
                    .await;
            }
        }
        Ok(())
    }

    /// Mute a user (moderator and above). The mute takes effect on the next
    /// send attempt; connectivity and reading are unaffected.
    pub async fn mute_user(
        &self,
        connection: &Connection,
        target_id: &str,
        reason: &str,
        duration: ModerationSpan,
    ) -> Result<()> {
        let session = self.authenticated_session(connection.id).await?;
        if !session.rank.can_mute() {
            return Err(RelayError::Unauthorized(
                "muting requires moderator rank".to_string(),
            ));
        }
        self.moderation
            .apply(ModerationRecord::new(
                target_id,
                ModerationKind::Mute,
                reason,
                Utc::now(),
                duration,
            ))
            .await;
        info!("{} muted {} ({:?})", session.user_id, target_id, duration);
        self.broadcaster
            .to_all(&ServerEvent::ModerationNotice {
                user_id: target_id.to_string(),
                kind: ModerationKind::Mute,
                reason: reason.to_string(),
                duration,
            })
            .await;
        Ok(())
    }

    /// Lift a user's active mute (moderator and above). The lift is itself
    /// an appended record, already expired at creation, which supersedes
    /// the active mute while keeping the history intact.
    pub async fn unmute_user(&self, connection: &Connection, target_id: &str) -> Result<()> {
        let session = self.authenticated_session(connection.id).await?;
        if !session.rank.can_mute() {
            return Err(RelayError::Unauthorized(
                "lifting a mute requires moderator rank".to_string(),
            ));
        }
        self.moderation
            .apply(ModerationRecord::lifted(
                target_id,
                ModerationKind::Mute,
                Utc::now(),
            ))
            .await;
        info!("{} unmuted {}", session.user_id, target_id);
        self.broadcaster
            .to_all(&ServerEvent::SystemNotice {
                room_id: None,
                content: format!("{} has been unmuted", target_id),
                timestamp: Utc::now(),
            })
            .await;
        Ok(())
    }

    /// Ban a user (admin and above). Enforced at authenticate time; live
    /// connections of the target are not forcibly closed.
    pub async fn ban_user(
        &self,
        connection: &Connection,
        target_id: &str,
        reason: &str,
        duration: ModerationSpan,
    ) -> Result<()> {
        let session = self.authenticated_session(connection.id).await?;
        if !session.rank.can_ban() {
            return Err(RelayError::Unauthorized(
                "banning requires admin rank".to_string(),
            ));
        }
        self.moderation
            .apply(ModerationRecord::new(
                target_id,
                ModerationKind::Ban,
                reason,
                Utc::now(),
                duration,
            ))
            .await;
        info!("{} banned {} ({:?})", session.user_id, target_id, duration);
        self.broadcaster
            .to_all(&ServerEvent::ModerationNotice {
                user_id: target_id.to_string(),
                kind: ModerationKind::Ban,
                reason: reason.to_string(),
                duration,
            })
            .await;
        Ok(())
    }

    /// Write a rank change through to the user store (admin and above).
    /// Live sessions keep their rank; the change applies on reconnect.
    pub async fn assign_rank(
        &self,
        connection: &Connection,
        target_id: &str,
        rank: Rank,
    ) -> Result<()> {
        let session = self.authenticated_session(connection.id).await?;
        if !session.rank.can_assign_rank() {
            return Err(RelayError::Unauthorized(
                "rank assignment requires admin rank".to_string(),
            ));
        }
        self.store.save_rank(target_id, rank).await?;
        info!("{} set rank of {} to {:?}", session.user_id, target_id, rank);
        self.broadcaster
            .to_all(&ServerEvent::UserUpdated {
                user_id: target_id.to_string(),
                rank,
            })
            .await;
        Ok(())
    }

    /// Spawn the periodic sweeps for flood windows and expired moderation
    /// records. The sweeps take the same internal locks as the interactive
    /// path.
    pub fn start_sweepers(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(coordinator.config.flood_sweep_interval);
            loop {
                ticker.tick().await;
                coordinator.floods.sweep(Utc::now()).await;
            }
        });

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(coordinator.config.moderation_sweep_interval);
            loop {
                ticker.tick().await;
                coordinator.moderation.sweep_expired(Utc::now()).await;
            }
        });
    }

    /// Presence registry (source of truth for who is online)
    pub fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.presence
    }

    /// Moderation record state
    pub fn moderation(&self) -> &ModerationState {
        &self.moderation
    }

    /// Flood window state
    pub fn flood_guard(&self) -> &FloodGuard {
        &self.floods
    }

    async fn state_of(&self, connection_id: ConnectionId) -> Option<ConnState> {
        self.states.read().await.get(&connection_id).cloned()
    }

    async fn authenticated_session(&self, connection_id: ConnectionId) -> Result<SessionInfo> {
        match self.state_of(connection_id).await {
            Some(ConnState::Authenticated(s)) | Some(ConnState::InRoom(s, _)) => Ok(s),
            Some(ConnState::Unauthenticated) => Err(RelayError::InvalidState(
                "action requires authentication".to_string(),
            )),
            None => Err(RelayError::ConnectionClosed),
        }
    }

    fn validate_content(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(RelayError::ValidationError(
                "message cannot be empty".to_string(),
            ));
        }
        if content.chars().count() > self.config.max_message_length {
            return Err(RelayError::MessageTooLarge(content.len()));
        }
        Ok(())
    }
}

// Shared reference to the coordinator
pub type SharedCoordinator = Arc<Coordinator>;
