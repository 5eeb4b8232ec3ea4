//! Graph nodes and edges

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interaction::{ArtifactId, EdgeKind, EventId, EventKind, Metadata};

/// Label of artifact nodes
pub const ARTIFACT_LABEL: &str = "Artifact";

/// Generate a deterministic ID from the given parts.
///
/// Parts are joined with a colon and hashed into a UUID v5.
pub fn deterministic_id(parts: &[&dyn std::fmt::Display]) -> Uuid {
    let data = parts
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(":");
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, data.as_bytes())
}

/// A node owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub user_id: Uuid,
    pub label: String,
    #[serde(default)]
    pub properties: Metadata,
    pub last_visited: DateTime<Utc>,
}

impl Node {
    /// Event node for a `recall` or `workspace` interaction
    pub fn event(
        user_id: Uuid,
        kind: EventKind,
        event_id: EventId,
        timestamp: DateTime<Utc>,
        metadata: Option<&Metadata>,
    ) -> Self {
        Self {
            id: event_id.0,
            user_id,
            label: kind.node_label().to_string(),
            properties: metadata.cloned().unwrap_or_default(),
            last_visited: timestamp,
        }
    }

    /// Reference node for an externally owned artifact
    pub fn artifact(user_id: Uuid, artifact_id: ArtifactId, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: artifact_id.0,
            user_id,
            label: ARTIFACT_LABEL.to_string(),
            properties: Metadata::new(),
            last_visited: timestamp,
        }
    }

    pub fn is_event(&self) -> bool {
        self.label == EventKind::Recall.node_label() || self.label == EventKind::Workspace.node_label()
    }
}

/// A relationship between two nodes of the same user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_node_id: Uuid,
    pub end_node_id: Uuid,
    pub relationship_type: String,
    #[serde(default = "default_directed")]
    pub directed: bool,
    #[serde(default)]
    pub properties: Metadata,
}

fn default_directed() -> bool {
    true
}

impl Edge {
    /// Labelled edge from an event to the artifact it acted on.
    ///
    /// The ID depends only on the endpoints and the relationship type, so
    /// writing the same interaction twice yields one edge.
    pub fn interaction(
        user_id: Uuid,
        kind: EdgeKind,
        event_id: EventId,
        artifact_id: ArtifactId,
        interaction_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let relationship_type = kind.relationship_type();
        let mut properties = Metadata::new();
        properties.insert("interaction_id".into(), interaction_id.to_string().into());
        properties.insert("timestamp".into(), timestamp.to_rfc3339().into());

        Self {
            id: deterministic_id(&[&user_id, &event_id, &artifact_id, &relationship_type]),
            user_id,
            start_node_id: event_id.0,
            end_node_id: artifact_id.0,
            relationship_type: relationship_type.to_string(),
            directed: true,
            properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_id_depends_on_every_part() {
        let a = deterministic_id(&[&"foo", &1, &"bar"]);
        let b = deterministic_id(&[&"foo", &1, &"bar"]);
        let c = deterministic_id(&[&"foo", &2, &"bar"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn interaction_edge_is_idempotent_per_endpoints_and_type() {
        let user = Uuid::new_v4();
        let event = EventId::new();
        let artifact = ArtifactId(Uuid::new_v4());
        let now = Utc::now();

        let first = Edge::interaction(user, EdgeKind::Keep, event, artifact, Uuid::new_v4(), now);
        let second = Edge::interaction(user, EdgeKind::Keep, event, artifact, Uuid::new_v4(), now);
        let other = Edge::interaction(user, EdgeKind::Peel, event, artifact, Uuid::new_v4(), now);

        assert_eq!(first.id, second.id);
        assert_ne!(first.id, other.id);
        assert_eq!(first.relationship_type, "KEEP");
        assert_eq!(first.start_node_id, event.0);
        assert_eq!(first.end_node_id, artifact.0);
    }

    #[test]
    fn event_nodes_use_event_labels() {
        let node = Node::event(Uuid::new_v4(), EventKind::Recall, EventId::new(), Utc::now(), None);
        assert_eq!(node.label, "RecallEvent");
        assert!(node.is_event());
        let artifact = Node::artifact(Uuid::new_v4(), ArtifactId(Uuid::new_v4()), Utc::now());
        assert!(!artifact.is_event());
    }
}
