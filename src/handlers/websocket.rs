//! Per-connection WebSocket handling
//! Owns the read loop and the ping/sync command dispatch

use std::net::SocketAddr;

use chrono::Utc;
use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use log::{debug, info, trace, warn};
use tokio::sync::mpsc;
use warp::ws::WebSocket;

use crate::core::connection::Connection;
use crate::core::message::{parse_client_message, ClientMessage, ServerMessage};
use crate::core::registry::SharedRegistry;
use crate::sync::SharedSyncProvider;

/// Handle one WebSocket client from upgrade to close.
///
/// `user_id` arrives already authenticated by the transport layer.
pub async fn handle_ws_client(
    ws: WebSocket,
    user_id: String,
    device_id: Option<String>,
    peer_addr: Option<SocketAddr>,
    registry: SharedRegistry,
    sync: SharedSyncProvider,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    // Forward task: drain the outbound queue into the socket
    tokio::task::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_tx.send(message).await {
                debug!("outbound websocket write failed: {}", e);
                break;
            }
        }
    });

    let connection = Connection::new(user_id.clone(), device_id.clone(), peer_addr, tx);
    let connection_id = connection.id.clone();

    registry.connect(connection).await;
    info!(
        "client connected: user={} connection={} ({} total)",
        user_id,
        connection_id,
        registry.connection_count().await
    );

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(frame) => {
                if let Ok(text) = frame.to_str() {
                    dispatch(
                        text,
                        &connection_id,
                        &user_id,
                        device_id.as_deref(),
                        &registry,
                        &sync,
                    )
                    .await;
                }
            }
            Err(e) => {
                debug!("websocket read error for connection {}: {}", connection_id, e);
                break;
            }
        }
    }

    registry.disconnect(&connection_id, &user_id).await;
    info!(
        "client disconnected: user={} connection={} ({} total)",
        user_id,
        connection_id,
        registry.connection_count().await
    );
}

// One inbound frame. Replies go to the same connection only.
async fn dispatch(
    raw: &str,
    connection_id: &str,
    user_id: &str,
    device_id: Option<&str>,
    registry: &SharedRegistry,
    sync: &SharedSyncProvider,
) {
    match parse_client_message(raw) {
        Ok(ClientMessage::Ping) => {
            registry
                .send_to_connection(
                    &ServerMessage::Pong {
                        timestamp: Utc::now(),
                    },
                    connection_id,
                )
                .await;
        }
        Ok(ClientMessage::SyncRequest) => {
            let data = sync.snapshot(user_id, device_id).await;
            registry
                .send_to_connection(
                    &ServerMessage::SyncResponse {
                        data,
                        timestamp: Utc::now(),
                    },
                    connection_id,
                )
                .await;
        }
        Ok(ClientMessage::Unknown) => {
            trace!(
                "ignoring unrecognized message type from connection {}",
                connection_id
            );
        }
        Err(e) => {
            // Listener policy: drop the frame, keep the connection
            warn!(
                "dropping malformed frame from connection {}: {}",
                connection_id, e
            );
        }
    }
}
