//! Event resolution
//!
//! Client-supplied event IDs pass through untouched; whether the event
//! actually exists is checked by the processor, not here.

use crate::error::ValidationError;
use crate::interaction::{EventId, Interaction, ResolvedInteraction};

/// Determine the effective event ID of a validated interaction.
///
/// Event-creating interactions without an ID get a freshly minted one.
/// Edge-creating interactions must reference an existing event.
pub fn resolve(interaction: Interaction) -> Result<ResolvedInteraction, ValidationError> {
    let (event_id, event_created) = match interaction.event_id {
        Some(event_id) => (event_id, false),
        None if interaction.action.creates_event() => (EventId::new(), true),
        None => return Err(ValidationError::missing_field("event_id")),
    };

    if event_created {
        tracing::debug!(%event_id, kind = %interaction.action.kind(), "Minted new event");
    }

    Ok(ResolvedInteraction {
        action: interaction.action,
        event_id,
        event_created,
        metadata: interaction.metadata,
        timestamp: interaction.timestamp,
    })
}
