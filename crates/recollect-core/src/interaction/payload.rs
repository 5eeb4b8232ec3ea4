//! Wire shapes of `POST /interaction`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::EventId;

/// Raw request body.
///
/// Fields are kept as untyped JSON so that missing or mistyped fields surface
/// as validation errors rather than opaque deserialization failures. A JSON
/// `null` reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

/// Outcome of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    Retry,
}

/// Response body of `POST /interaction`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostResponse {
    pub status: AckStatus,
    pub message: Option<String>,
    pub event_id: Option<EventId>,
}

impl PostResponse {
    pub fn ok(event_id: EventId) -> Self {
        Self {
            status: AckStatus::Ok,
            message: None,
            event_id: Some(event_id),
        }
    }

    pub fn retry(message: impl Into<String>, event_id: Option<EventId>) -> Self {
        Self {
            status: AckStatus::Retry,
            message: Some(message.into()),
            event_id,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AckStatus::Ok
    }
}
