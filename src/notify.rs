//! Notification entry points for surrounding collaborators
//!
//! Monitoring, device tracking, and the prayer scheduler call in here; the
//! registry does the routing. All delivery is best effort.

use chrono::Utc;
use log::debug;
use serde_json::Value;

use crate::core::message::ServerMessage;
use crate::core::registry::ConnectionRegistry;

/// Push a risk alert about a child to the parent's connections
pub async fn notify_parent_alert(
    registry: &ConnectionRegistry,
    parent_id: &str,
    child_id: &str,
    alert_type: &str,
    message: &str,
    data: Value,
) -> usize {
    let delivered = registry
        .send_to_user(
            parent_id,
            &ServerMessage::Alert {
                alert_type: alert_type.to_string(),
                child_id: child_id.to_string(),
                message: message.to_string(),
                data,
                timestamp: Utc::now(),
            },
        )
        .await;
    debug!(
        "alert {} for parent {} delivered to {} connections",
        alert_type, parent_id, delivered
    );
    delivered
}

/// Push a status update to a device-identified user
pub async fn notify_device_status(
    registry: &ConnectionRegistry,
    device_id: &str,
    status: &str,
) -> usize {
    registry
        .send_to_user(
            device_id,
            &ServerMessage::DeviceStatus {
                status: status.to_string(),
                timestamp: Utc::now(),
            },
        )
        .await
}

/// Broadcast a prayer time update to every connected user
pub async fn broadcast_prayer_times(registry: &ConnectionRegistry, prayer_times: Value) -> usize {
    registry
        .broadcast(
            &ServerMessage::PrayerTime {
                prayer_times,
                timestamp: Utc::now(),
            },
            &[],
        )
        .await
}
