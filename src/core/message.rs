//! Wire protocol for the relay channel
//! Tagged JSON envelopes in both directions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RelayError, Result};

/// Client-to-server message types
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Liveness probe, answered with `pong`
    Ping,

    /// Ask for a state snapshot, answered with `sync_response`
    SyncRequest,

    /// Any unrecognized tag; accepted and ignored so newer clients
    /// never break the read loop
    #[serde(other)]
    Unknown,
}

/// Parse one inbound text frame
pub fn parse_client_message(raw: &str) -> Result<ClientMessage> {
    serde_json::from_str(raw).map_err(|e| RelayError::MessageParse(e.to_string()))
}

/// Server-to-client message types
///
/// Every variant carries an ISO-8601 timestamp on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established acknowledgement, sent to the new connection only
    Connection {
        status: String,
        user_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Reply to a client `ping`
    Pong { timestamp: DateTime<Utc> },

    /// Reply to a client `sync_request`; the payload comes from the
    /// data-access collaborator
    SyncResponse {
        data: Value,
        timestamp: DateTime<Utc>,
    },

    /// Risk alert for a parent, routed per user
    Alert {
        alert_type: String,
        child_id: String,
        message: String,
        data: Value,
        timestamp: DateTime<Utc>,
    },

    /// Device status update, routed per user
    DeviceStatus {
        status: String,
        timestamp: DateTime<Utc>,
    },

    /// Prayer time update, broadcast to everyone
    PrayerTime {
        prayer_times: Value,
        timestamp: DateTime<Utc>,
    },
}

impl ServerMessage {
    /// Wire tag of this message, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Pong { .. } => "pong",
            Self::SyncResponse { .. } => "sync_response",
            Self::Alert { .. } => "alert",
            Self::DeviceStatus { .. } => "device_status",
            Self::PrayerTime { .. } => "prayer_time",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alert_wire_format() {
        let alert = ServerMessage::Alert {
            alert_type: "bedtime".to_string(),
            child_id: "c1".to_string(),
            message: "Screen time exceeded".to_string(),
            data: json!({"minutes": 135}),
            timestamp: Utc::now(),
        };

        let value: Value = serde_json::from_str(&serde_json::to_string(&alert).unwrap()).unwrap();
        assert_eq!(value["type"], "alert");
        assert_eq!(value["alert_type"], "bedtime");
        assert_eq!(value["child_id"], "c1");
        assert_eq!(value["data"]["minutes"], 135);
        assert!(value["timestamp"].is_string());
        assert_eq!(alert.kind(), "alert");
    }

    #[test]
    fn test_parse_known_client_messages() {
        assert!(matches!(
            parse_client_message(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Ping
        ));
        assert!(matches!(
            parse_client_message(r#"{"type":"sync_request","since":"2026-01-01"}"#).unwrap(),
            ClientMessage::SyncRequest
        ));
    }

    #[test]
    fn test_unrecognized_type_is_accepted() {
        assert!(matches!(
            parse_client_message(r#"{"type":"device_location","lat":1.0}"#).unwrap(),
            ClientMessage::Unknown
        ));
    }

    #[test]
    fn test_malformed_frames_are_errors() {
        assert!(parse_client_message("not json").is_err());
        assert!(parse_client_message(r#"{"no_type":true}"#).is_err());
    }
}
