//! Interaction types flowing from the API boundary to the processor

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::kind::{EdgeKind, EventKind, InteractionKind};

/// Free-form, kind-specific key/value payload
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Grouping key shared by an event and every interaction nested under it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Mint a new random event ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to an item owned by the external artifact store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub Uuid);

impl ArtifactId {
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the user did. Each variant carries exactly the fields its kind needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Recall,
    Workspace,
    Peel { artifact_id: ArtifactId },
    Keep { artifact_id: ArtifactId },
    MarkGood { artifact_id: ArtifactId },
    MarkBad { artifact_id: ArtifactId },
}

impl Action {
    /// Build the edge-creating action for `kind`
    pub fn edge(kind: EdgeKind, artifact_id: ArtifactId) -> Self {
        match kind {
            EdgeKind::Peel => Action::Peel { artifact_id },
            EdgeKind::Keep => Action::Keep { artifact_id },
            EdgeKind::MarkGood => Action::MarkGood { artifact_id },
            EdgeKind::MarkBad => Action::MarkBad { artifact_id },
        }
    }

    /// Build the node-creating action for `kind`
    pub fn event(kind: EventKind) -> Self {
        match kind {
            EventKind::Recall => Action::Recall,
            EventKind::Workspace => Action::Workspace,
        }
    }

    pub fn kind(&self) -> InteractionKind {
        match self {
            Action::Recall => InteractionKind::Recall,
            Action::Workspace => InteractionKind::Workspace,
            Action::Peel { .. } => InteractionKind::Peel,
            Action::Keep { .. } => InteractionKind::Keep,
            Action::MarkGood { .. } => InteractionKind::MarkGood,
            Action::MarkBad { .. } => InteractionKind::MarkBad,
        }
    }

    pub fn artifact_id(&self) -> Option<ArtifactId> {
        match self {
            Action::Recall | Action::Workspace => None,
            Action::Peel { artifact_id }
            | Action::Keep { artifact_id }
            | Action::MarkGood { artifact_id }
            | Action::MarkBad { artifact_id } => Some(*artifact_id),
        }
    }

    pub fn creates_event(&self) -> bool {
        self.kind().creates_event()
    }

    /// The graph write this action asks for
    pub fn graph_write(&self) -> GraphWrite {
        match *self {
            Action::Recall => GraphWrite::Event(EventKind::Recall),
            Action::Workspace => GraphWrite::Event(EventKind::Workspace),
            Action::Peel { artifact_id } => GraphWrite::Edge(EdgeKind::Peel, artifact_id),
            Action::Keep { artifact_id } => GraphWrite::Edge(EdgeKind::Keep, artifact_id),
            Action::MarkGood { artifact_id } => GraphWrite::Edge(EdgeKind::MarkGood, artifact_id),
            Action::MarkBad { artifact_id } => GraphWrite::Edge(EdgeKind::MarkBad, artifact_id),
        }
    }
}

/// Event node to upsert, or edge from the event to an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphWrite {
    Event(EventKind),
    Edge(EdgeKind, ArtifactId),
}

/// A structurally valid interaction whose event may not yet be resolved
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub action: Action,
    pub event_id: Option<EventId>,
    pub metadata: Option<Metadata>,
    /// When the interaction happened on the client
    pub timestamp: DateTime<Utc>,
}

/// An interaction with its effective event ID
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInteraction {
    pub action: Action,
    pub event_id: EventId,
    /// True when the event ID was minted for this request
    pub event_created: bool,
    pub metadata: Option<Metadata>,
    pub timestamp: DateTime<Utc>,
}

/// Metadata recognised on `recall` interactions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallMetadata {
    #[serde(default)]
    pub query: Option<String>,
}

/// The unit of work placed on the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedInteraction {
    /// Deterministic interaction ID, stable across client replays
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: EventId,
    pub action: Action,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    pub timestamp: DateTime<Utc>,
    /// Server receipt time
    pub received_at: DateTime<Utc>,
}

impl QueuedInteraction {
    /// Wrap a resolved interaction for the given user
    pub fn new(user_id: Uuid, interaction: ResolvedInteraction) -> Self {
        let id = Self::deterministic_id(user_id, &interaction);
        Self {
            id,
            user_id,
            event_id: interaction.event_id,
            action: interaction.action,
            metadata: interaction.metadata,
            timestamp: interaction.timestamp,
            received_at: Utc::now(),
        }
    }

    /// Hash the identifying parts of an interaction into a UUID v5.
    ///
    /// Parts are joined with a colon before hashing, so replays of the same
    /// request land on the same ID.
    pub fn deterministic_id(user_id: Uuid, interaction: &ResolvedInteraction) -> Uuid {
        let artifact = interaction
            .action
            .artifact_id()
            .map(|a| a.to_string())
            .unwrap_or_default();
        let data = [
            user_id.to_string(),
            interaction.event_id.to_string(),
            interaction.action.kind().to_string(),
            artifact,
            interaction.timestamp.timestamp_micros().to_string(),
        ]
        .join(":");
        Uuid::new_v5(&Uuid::NAMESPACE_DNS, data.as_bytes())
    }

    pub fn kind(&self) -> InteractionKind {
        self.action.kind()
    }

    /// Deserialize the metadata map into a typed view
    pub fn typed_metadata<T: DeserializeOwned + Default>(&self) -> Result<T, serde_json::Error> {
        match &self.metadata {
            Some(map) => serde_json::from_value(serde_json::Value::Object(map.clone())),
            None => Ok(T::default()),
        }
    }
}

impl std::fmt::Display for QueuedInteraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interaction {} ({}) on event {}", self.id, self.kind(), self.event_id)
    }
}
