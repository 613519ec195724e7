//! Seam for the data-access collaborator that builds sync payloads
//!
//! The relay only fixes the `sync_response` envelope; what goes inside it is
//! whatever the surrounding backend wants to push down on reconnect.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Produces the `data` payload of a `sync_response`
#[async_trait]
pub trait SyncProvider: Send + Sync {
    async fn snapshot(&self, user_id: &str, device_id: Option<&str>) -> Value;
}

/// Provider used until a real data-access layer is wired in
pub struct EmptySyncProvider;

#[async_trait]
impl SyncProvider for EmptySyncProvider {
    async fn snapshot(&self, _user_id: &str, _device_id: Option<&str>) -> Value {
        Value::Object(Map::new())
    }
}

// Shared reference to the sync provider
pub type SharedSyncProvider = Arc<dyn SyncProvider>;
