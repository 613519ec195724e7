//! WebSocket connection handle
//! One handle per live client session, owned by the registry for routing

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::Message;

/// One live client session: routing sender plus its metadata.
///
/// The underlying socket belongs to the listener task; the registry only
/// holds this handle and drops it on disconnect or send failure.
pub struct Connection {
    pub id: String,
    pub user_id: String,
    pub device_id: Option<String>,
    pub peer_addr: Option<SocketAddr>,
    pub connected_at: DateTime<Utc>,
    pub sender: mpsc::UnboundedSender<Message>,
}

impl Connection {
    /// Create a new connection handle with a unique ID
    pub fn new(
        user_id: String,
        device_id: Option<String>,
        peer_addr: Option<SocketAddr>,
        sender: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            device_id,
            peer_addr,
            connected_at: Utc::now(),
            sender,
        }
    }

    /// Best-effort peer address for diagnostics
    pub fn peer_label(&self) -> String {
        match self.peer_addr {
            Some(addr) => addr.to_string(),
            None => "unknown".to_string(),
        }
    }
}
