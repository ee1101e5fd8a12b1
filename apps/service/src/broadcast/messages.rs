//! Subscriber wire protocol (JSON text frames, tagged by `type`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monitoring::types::HealthStatus;

/// Messages a subscriber sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        #[serde(default)]
        service_id: Option<Uuid>,
        #[serde(default)]
        environment_id: Option<Uuid>,
    },
    Unsubscribe {
        #[serde(default)]
        service_id: Option<Uuid>,
        #[serde(default)]
        environment_id: Option<Uuid>,
    },
    Ping,
}

/// Why an inbound frame could not be used
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Not JSON at all; the connection is dropped
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ClientMessage {
    /// Decode a text frame.
    ///
    /// `Ok(None)` means valid JSON of an unknown shape, which is ignored.
    pub fn parse(text: &str) -> Result<Option<Self>, FrameError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Ok(serde_json::from_value(value).ok())
    }
}

/// Payload of a `status_update` push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub service_id: Uuid,
    pub environment_id: Uuid,
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Messages pushed to a subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service_id: Option<Uuid>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        environment_id: Option<Uuid>,
    },
    Pong,
    StatusUpdate(StatusUpdate),
}

impl ServerMessage {
    pub fn subscribed_service(service_id: Uuid) -> Self {
        ServerMessage::Subscribed { service_id: Some(service_id), environment_id: None }
    }

    pub fn subscribed_environment(environment_id: Uuid) -> Self {
        ServerMessage::Subscribed { service_id: None, environment_id: Some(environment_id) }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
