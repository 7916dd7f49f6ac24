//! Authentication collaborator boundary

pub mod provider;
pub mod user;

// Re-export main components
pub use provider::{ActiveBan, AuthProvider, StaticTokenProvider};
pub use user::{Rank, UserProfile};
