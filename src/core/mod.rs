//! Core coordinator functionality

pub mod broadcast;
pub mod connection;
pub mod coordinator;
pub mod events;
pub mod moderation;
pub mod presence;
pub mod rate_limiter;

// Re-export main components for convenience
pub use broadcast::RoomBroadcaster;
pub use connection::{Connection, ConnectionId};
pub use coordinator::{Coordinator, SharedCoordinator};
pub use events::{ClientEvent, ServerEvent};
pub use moderation::{ModerationKind, ModerationRecord, ModerationSpan, ModerationState};
pub use presence::PresenceRegistry;
pub use rate_limiter::{FloodDecision, FloodGuard};
