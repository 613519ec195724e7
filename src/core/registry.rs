//! Connection registry and message routing
//! Tracks every live connection per user and fans outbound messages out to them

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, trace, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use warp::ws::Message as WsMessage;

use crate::core::connection::Connection;
use crate::core::message::ServerMessage;

// Both maps are mutated together: a connection id is in `users` iff it has
// an entry in `entries`, and a user key exists only while its set is non-empty.
#[derive(Default)]
struct RegistryInner {
    users: HashMap<String, HashSet<String>>,
    entries: HashMap<String, Connection>,
}

/// Registry of live connections, keyed by user identity.
///
/// A user may hold several simultaneous connections (multi-device). The lock
/// guards the maps only; outbound sends always happen after it is released.
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Register a new connection and acknowledge it.
    ///
    /// The acknowledgement goes to this connection only, never broadcast.
    pub async fn connect(&self, connection: Connection) {
        let connection_id = connection.id.clone();
        let user_id = connection.user_id.clone();
        let peer = connection.peer_label();

        {
            let mut inner = self.inner.write().await;
            inner
                .users
                .entry(user_id.clone())
                .or_default()
                .insert(connection_id.clone());
            inner.entries.insert(connection_id.clone(), connection);
        }

        debug!(
            "registered connection {} for user {} from {}",
            connection_id, user_id, peer
        );

        let ack = ServerMessage::Connection {
            status: "connected".to_string(),
            user_id,
            timestamp: Utc::now(),
        };
        self.send_to_connection(&ack, &connection_id).await;
    }

    /// Deregister a connection. Idempotent: unknown ids are a no-op.
    pub async fn disconnect(&self, connection_id: &str, user_id: &str) {
        let mut inner = self.inner.write().await;

        let now_empty = match inner.users.get_mut(user_id) {
            Some(ids) => {
                ids.remove(connection_id);
                ids.is_empty()
            }
            None => false,
        };
        if now_empty {
            inner.users.remove(user_id);
        }

        if inner.entries.remove(connection_id).is_some() {
            debug!(
                "deregistered connection {} for user {}",
                connection_id, user_id
            );
        }
    }

    /// Send a message to one connection, best effort.
    ///
    /// Write failures are swallowed; the read loop or a later fan-out
    /// reclaims the slot.
    pub async fn send_to_connection(&self, message: &ServerMessage, connection_id: &str) -> bool {
        let frame = match encode(message) {
            Some(frame) => frame,
            None => return false,
        };

        let sender = {
            let inner = self.inner.read().await;
            inner
                .entries
                .get(connection_id)
                .map(|conn| conn.sender.clone())
        };

        match sender {
            Some(sender) => match sender.send(frame) {
                Ok(()) => true,
                Err(_) => {
                    warn!(
                        "failed to deliver {} frame to connection {}",
                        message.kind(),
                        connection_id
                    );
                    false
                }
            },
            None => false,
        }
    }

    /// Send a message to every connection of one user.
    ///
    /// An unknown user is a silent no-op; the target may simply be offline.
    /// Connections whose send fails are pruned after the fan-out completes.
    pub async fn send_to_user(&self, user_id: &str, message: &ServerMessage) -> usize {
        let frame = match encode(message) {
            Some(frame) => frame,
            None => return 0,
        };

        let targets: Vec<(String, UnboundedSender<WsMessage>)> = {
            let inner = self.inner.read().await;
            match inner.users.get(user_id) {
                Some(ids) => ids
                    .iter()
                    .filter_map(|id| {
                        inner
                            .entries
                            .get(id)
                            .map(|conn| (id.clone(), conn.sender.clone()))
                    })
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (connection_id, sender) in targets {
            if sender.send(frame.clone()).is_ok() {
                trace!(
                    "sent {} frame to user {} connection {}",
                    message.kind(),
                    user_id,
                    connection_id
                );
                delivered += 1;
            } else {
                failed.push(connection_id);
            }
        }

        for connection_id in failed {
            warn!(
                "pruning dead connection {} for user {}",
                connection_id, user_id
            );
            self.disconnect(&connection_id, user_id).await;
        }

        delivered
    }

    /// Send a message to every connection of every user not excluded.
    ///
    /// Per-connection failures never abort delivery to the rest; failed
    /// connections are pruned the same way as in `send_to_user`.
    pub async fn broadcast(&self, message: &ServerMessage, exclude_users: &[String]) -> usize {
        let frame = match encode(message) {
            Some(frame) => frame,
            None => return 0,
        };

        let targets: Vec<(String, String, UnboundedSender<WsMessage>)> = {
            let inner = self.inner.read().await;
            let mut targets = Vec::new();
            for (user_id, ids) in &inner.users {
                if exclude_users.contains(user_id) {
                    continue;
                }
                for id in ids {
                    if let Some(conn) = inner.entries.get(id) {
                        targets.push((user_id.clone(), id.clone(), conn.sender.clone()));
                    }
                }
            }
            targets
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (user_id, connection_id, sender) in targets {
            if sender.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                failed.push((user_id, connection_id));
            }
        }

        for (user_id, connection_id) in failed {
            warn!(
                "pruning dead connection {} for user {}",
                connection_id, user_id
            );
            self.disconnect(&connection_id, &user_id).await;
        }

        info!("broadcast {} frame to {} connections", message.kind(), delivered);
        delivered
    }

    /// Snapshot of user identities with at least one live connection
    pub async fn connected_users(&self) -> Vec<String> {
        self.inner.read().await.users.keys().cloned().collect()
    }

    /// Total live connections across all users
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(message: &ServerMessage) -> Option<WsMessage> {
    match serde_json::to_string(message) {
        Ok(text) => Some(WsMessage::text(text)),
        Err(e) => {
            error!("failed to serialize {} message: {}", message.kind(), e);
            None
        }
    }
}

// Shared reference to the registry
pub type SharedRegistry = Arc<ConnectionRegistry>;
