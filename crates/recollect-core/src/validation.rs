//! Structural validation of interaction payloads
//!
//! Turns a raw [`PostPayload`] into a typed [`Interaction`]. Nothing that
//! fails here is ever queued.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::ValidationError;
use crate::interaction::{
    Action, ArtifactId, EventId, Interaction, InteractionKind, KindClass, PostPayload,
};

/// Validate a raw payload
pub fn validate(payload: &PostPayload) -> Result<Interaction, ValidationError> {
    let kind: InteractionKind = match payload.kind.as_ref() {
        None => return Err(ValidationError::missing_field("kind")),
        Some(Value::String(kind)) => kind.parse()?,
        Some(other) => return Err(ValidationError::invalid_kind(other.to_string())),
    };

    let timestamp = parse_timestamp(
        payload
            .timestamp
            .as_ref()
            .ok_or_else(|| ValidationError::missing_field("timestamp"))?,
    )?;

    let event_id = identifier(payload.event_id.as_ref(), "event_id")?
        .map(|raw| {
            EventId::parse(raw).map_err(|e| {
                ValidationError::invalid_identifier("event_id", format!("'{}': {}", raw, e))
            })
        })
        .transpose()?;

    let metadata = match payload.metadata.as_ref() {
        None => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(other) => {
            return Err(ValidationError::invalid_metadata(format!(
                "expected an object, got {}",
                other
            )))
        }
    };

    let action = match kind.class() {
        KindClass::Event(event_kind) => {
            if let Some(artifact_id) = &payload.artifact_id {
                tracing::debug!(%kind, %artifact_id, "Ignoring artifact_id on event-creating interaction");
            }
            Action::event(event_kind)
        }
        KindClass::Edge(edge_kind) => {
            let raw = identifier(payload.artifact_id.as_ref(), "artifact_id")?
                .ok_or_else(|| ValidationError::missing_field("artifact_id"))?;
            let artifact_id = ArtifactId::parse(raw).map_err(|e| {
                ValidationError::invalid_identifier("artifact_id", format!("'{}': {}", raw, e))
            })?;
            Action::edge(edge_kind, artifact_id)
        }
    };

    Ok(Interaction {
        action,
        event_id,
        metadata,
        timestamp,
    })
}

/// An identifier field must be a JSON string when present
fn identifier<'a>(value: Option<&'a Value>, field: &'static str) -> Result<Option<&'a str>, ValidationError> {
    match value {
        None => Ok(None),
        Some(Value::String(raw)) => Ok(Some(raw)),
        Some(other) => Err(ValidationError::invalid_identifier(
            field,
            format!("expected a UUID string, got {}", other),
        )),
    }
}

/// Parse epoch seconds (UTC) from a JSON number
pub fn parse_timestamp(value: &serde_json::Value) -> Result<DateTime<Utc>, ValidationError> {
    let secs = value
        .as_f64()
        .ok_or_else(|| ValidationError::invalid_timestamp(format!("expected epoch seconds, got {}", value)))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(ValidationError::invalid_timestamp(format!(
            "{} is not a valid epoch time",
            secs
        )));
    }

    let micros = (secs * 1_000_000.0).round();
    if micros > i64::MAX as f64 {
        return Err(ValidationError::invalid_timestamp(format!("{} is out of range", secs)));
    }

    DateTime::<Utc>::from_timestamp_micros(micros as i64)
        .ok_or_else(|| ValidationError::invalid_timestamp(format!("{} is out of range", secs)))
}
