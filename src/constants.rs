// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3030;
pub const WS_PATH: &str = "ws";

// Flood control: more than FLOOD_MAX_MESSAGES sends within FLOOD_WINDOW_SECS
// triggers an automatic mute of FLOOD_AUTO_MUTE_SECS.
pub const FLOOD_WINDOW_SECS: i64 = 10;
pub const FLOOD_MAX_MESSAGES: usize = 5;
pub const FLOOD_AUTO_MUTE_SECS: i64 = 5 * 60;

// Periodic sweep intervals
pub const FLOOD_SWEEP_SECS: u64 = 60;
pub const FLOOD_RETENTION_SECS: i64 = 60;
pub const MODERATION_SWEEP_SECS: u64 = 30;

// Inbound message limits
pub const MAX_MESSAGE_LENGTH: usize = 2000;
pub const MAX_FRAME_SIZE: usize = 8 * 1024;
