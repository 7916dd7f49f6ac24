use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum RelayError {
    // State machine errors
    InvalidState(String),

    // Presence errors
    AlreadyRegistered(String),
    SessionNotFound(String),
    ConnectionClosed,

    // Gatekeeping errors
    InvalidToken,
    Banned,
    Muted,
    Flooded,
    Unauthorized(String),

    // Collaborator errors
    PersistenceFailure(String),

    // Inbound payload errors
    MessageParseError(String),
    MessageTooLarge(usize),
    ValidationError(String),

    // Configuration errors
    ConfigError(String),
}

impl RelayError {
    /// Wire-level error code carried in `ServerEvent::Error`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidState(_) => "INVALID_STATE",
            Self::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Banned => "BANNED",
            Self::Muted => "MUTED",
            Self::Flooded => "FLOODED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            Self::MessageParseError(_) => "PARSE_ERROR",
            Self::MessageTooLarge(_) => "MESSAGE_TOO_LARGE",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState(msg) => write!(f, "Invalid state transition: {}", msg),
            Self::AlreadyRegistered(id) => write!(f, "Connection already registered: {}", id),
            Self::SessionNotFound(id) => write!(f, "Session not found: {}", id),
            Self::ConnectionClosed => write!(f, "Connection closed"),
            Self::InvalidToken => write!(f, "Invalid credential token"),
            Self::Banned => write!(f, "You are banned from this server"),
            Self::Muted => write!(f, "You are muted and cannot send messages"),
            Self::Flooded => write!(f, "You have been muted for sending messages too quickly"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            Self::PersistenceFailure(msg) => write!(f, "Persistence failure: {}", msg),
            Self::MessageParseError(msg) => write!(f, "Message parse error: {}", msg),
            Self::MessageTooLarge(size) => write!(f, "Message too large: {} bytes", size),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for RelayError {}

// Generic result type for the relay
pub type Result<T> = std::result::Result<T, RelayError>;
