//! Transport handlers for the relay server

pub mod websocket;
