//! Interaction model
//!
//! An interaction is a single tracked user action. `recall` and `workspace`
//! interactions establish an event; `peel`, `keep`, `mark_good` and
//! `mark_bad` link an existing event to an artifact.

mod kind;
mod payload;
mod types;

pub use kind::{EdgeKind, EventKind, InteractionKind, KindClass};
pub use payload::{AckStatus, PostPayload, PostResponse};
pub use types::{
    Action, ArtifactId, EventId, GraphWrite, Interaction, Metadata, QueuedInteraction, RecallMetadata,
    ResolvedInteraction,
};
