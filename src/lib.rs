//! Chat Relay - a room-scoped message relay server
//!
//! This library implements the connection and broadcast coordinator for a
//! real-time chat service: presence tracking, flood control, mute/ban
//! enforcement and room-scoped fan-out. Authentication and message
//! persistence are external collaborators reached through the traits in
//! `auth` and `storage`.

pub mod auth;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod storage;

// Re-export main components
pub use config::RelayConfig;
pub use constants::*;
pub use crate::core::coordinator::{Coordinator, SharedCoordinator};
