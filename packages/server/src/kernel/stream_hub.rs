//! In-process pub/sub hub for realtime fan-out.
//!
//! Rooms are opaque strings keyed by recipient: `user:<id>` for adopters and
//! `shelter:<id>` for staff dashboards. Messages are
//! `{"event": <name>, "payload": <json>}`.
//!
//! Producers (domain activities):
//!   hub.publish("user:abc-123", json!({"event": "application.status_changed"})).await;
//!
//! Consumers (transport layer):
//!   let rx = hub.subscribe("user:abc-123").await;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{broadcast, RwLock};

use super::BaseRealtime;
use crate::common::{ShelterId, UserId};

pub fn user_room(user_id: UserId) -> String {
    format!("user:{}", user_id)
}

pub fn shelter_room(shelter_id: ShelterId) -> String {
    format!("shelter:{}", shelter_id)
}

/// Generic in-process pub/sub hub.
///
/// Thread-safe, cloneable. Keyed by string topics.
/// Payloads are `serde_json::Value`; domains serialize their own types.
#[derive(Clone)]
pub struct StreamHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<serde_json::Value>>>>,
    capacity: usize,
}

impl StreamHub {
    /// Create a new StreamHub with default capacity (256 messages per channel).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new StreamHub with the given channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish a JSON value to a topic. No-op if no subscribers.
    pub async fn publish(&self, topic: &str, value: serde_json::Value) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(topic) {
            // Ignore send errors (no active receivers)
            let _ = tx.send(value);
        }
    }

    /// Subscribe to a topic. Creates the channel if it doesn't exist.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<serde_json::Value> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    /// Remove channels with zero subscribers (housekeeping).
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseRealtime for StreamHub {
    async fn publish(&self, room: &str, event: &str, payload: serde_json::Value) {
        StreamHub::publish(self, room, json!({ "event": event, "payload": payload })).await;
    }
}
