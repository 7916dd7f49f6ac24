//! WebSocket transport glue
//!
//! One handler task per connection reads inbound frames and dispatches them
//! to the coordinator in arrival order; a forward task drains the outbound
//! channel into the socket sink. Per-operation errors go back to the sender
//! only; a ban at authentication closes the connection.

use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use warp::ws::{WebSocket, Ws};
use warp::Filter;

use crate::constants::{MAX_FRAME_SIZE, WS_PATH};
use crate::core::connection::Connection;
use crate::core::coordinator::SharedCoordinator;
use crate::core::events::{ClientEvent, ServerEvent};
use crate::error::RelayError;

/// Build the WebSocket route for the relay endpoint
pub fn ws_route(
    coordinator: SharedCoordinator,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path(WS_PATH)
        .and(warp::ws())
        .and(warp::any().map(move || coordinator.clone()))
        .map(|ws: Ws, coordinator: SharedCoordinator| {
            ws.on_upgrade(move |socket| handle_ws_client(socket, coordinator))
        })
}

/// Handle one WebSocket connection for its whole lifetime
pub async fn handle_ws_client(ws: WebSocket, coordinator: SharedCoordinator) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    // Forward outbound events from the channel into the socket sink
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_tx.send(message).await {
                debug!("Outbound socket closed: {}", e);
                break;
            }
        }
    });

    let connection = Connection::new(tx);
    coordinator.connect(&connection).await;
    connection.send_text(
        &ServerEvent::Connected {
            connection_id: connection.id.to_string(),
        }
        .to_json(),
    );

    // Events for a single connection are processed in arrival order
    while let Some(result) = ws_rx.next().await {
        let frame = match result {
            Ok(frame) => frame,
            Err(e) => {
                warn!("WebSocket error on {}: {}", connection.id, e);
                break;
            }
        };
        if frame.is_close() {
            break;
        }
        if !frame.is_text() {
            continue;
        }
        let text = match frame.to_str() {
            Ok(text) => text,
            Err(_) => continue,
        };

        match parse_event(text) {
            Ok(ClientEvent::Disconnect) => {
                if let Err(e) = coordinator.disconnect(connection.id).await {
                    error!("Disconnect failed for {}: {}", connection.id, e);
                }
                break;
            }
            Ok(event) => {
                if let Err(e) = coordinator.handle_event(&connection, event).await {
                    report_error(&connection, &e);
                    if matches!(e, RelayError::Banned) {
                        break;
                    }
                }
            }
            Err(e) => report_error(&connection, &e),
        }
    }

    // Transport closed; tear down whatever state the connection still holds
    if let Err(e) = coordinator.disconnect(connection.id).await {
        error!("Cleanup disconnect failed for {}: {}", connection.id, e);
    }
    info!("Connection closed: {}", connection.id);
}

fn parse_event(text: &str) -> crate::error::Result<ClientEvent> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(RelayError::MessageTooLarge(text.len()));
    }
    serde_json::from_str(text).map_err(|e| RelayError::MessageParseError(e.to_string()))
}

fn report_error(connection: &Connection, error: &RelayError) {
    warn!("Operation failed on {}: {}", connection.id, error);
    connection.send_text(
        &ServerEvent::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        }
        .to_json(),
    );
}
