//! The closed set of interaction kinds

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Every kind of tracked user action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Recall,
    Workspace,
    Peel,
    Keep,
    MarkGood,
    MarkBad,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 6] = [
        InteractionKind::Recall,
        InteractionKind::Workspace,
        InteractionKind::Peel,
        InteractionKind::Keep,
        InteractionKind::MarkGood,
        InteractionKind::MarkBad,
    ];

    /// Wire name, as used in request payloads and the `interaction` table
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recall => "recall",
            Self::Workspace => "workspace",
            Self::Peel => "peel",
            Self::Keep => "keep",
            Self::MarkGood => "mark_good",
            Self::MarkBad => "mark_bad",
        }
    }

    /// Split the taxonomy into event-creating and edge-creating kinds
    pub fn class(&self) -> KindClass {
        match self {
            Self::Recall => KindClass::Event(EventKind::Recall),
            Self::Workspace => KindClass::Event(EventKind::Workspace),
            Self::Peel => KindClass::Edge(EdgeKind::Peel),
            Self::Keep => KindClass::Edge(EdgeKind::Keep),
            Self::MarkGood => KindClass::Edge(EdgeKind::MarkGood),
            Self::MarkBad => KindClass::Edge(EdgeKind::MarkBad),
        }
    }

    /// Node-creating kinds establish an event
    pub fn creates_event(&self) -> bool {
        matches!(self.class(), KindClass::Event(_))
    }

    pub fn event_kind(&self) -> Option<EventKind> {
        match self.class() {
            KindClass::Event(kind) => Some(kind),
            KindClass::Edge(_) => None,
        }
    }

    pub fn edge_kind(&self) -> Option<EdgeKind> {
        match self.class() {
            KindClass::Edge(kind) => Some(kind),
            KindClass::Event(_) => None,
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_kind(s))
    }
}

/// Event-creating or edge-creating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindClass {
    Event(EventKind),
    Edge(EdgeKind),
}

/// Kinds that create an event node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Recall,
    Workspace,
}

impl EventKind {
    /// Graph label of the event node
    pub fn node_label(&self) -> &'static str {
        match self {
            Self::Recall => "RecallEvent",
            Self::Workspace => "WorkspaceEvent",
        }
    }

    pub fn interaction_kind(&self) -> InteractionKind {
        match self {
            Self::Recall => InteractionKind::Recall,
            Self::Workspace => InteractionKind::Workspace,
        }
    }
}

/// Kinds that create an edge from an event to an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Peel,
    Keep,
    MarkGood,
    MarkBad,
}

impl EdgeKind {
    /// Relationship type of the graph edge
    pub fn relationship_type(&self) -> &'static str {
        match self {
            Self::Peel => "PEEL",
            Self::Keep => "KEEP",
            Self::MarkGood => "MARK_GOOD",
            Self::MarkBad => "MARK_BAD",
        }
    }

    pub fn interaction_kind(&self) -> InteractionKind {
        match self {
            Self::Peel => InteractionKind::Peel,
            Self::Keep => InteractionKind::Keep,
            Self::MarkGood => InteractionKind::MarkGood,
            Self::MarkBad => InteractionKind::MarkBad,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case("recall", InteractionKind::Recall)]
    #[case("workspace", InteractionKind::Workspace)]
    #[case("peel", InteractionKind::Peel)]
    #[case("keep", InteractionKind::Keep)]
    #[case("mark_good", InteractionKind::MarkGood)]
    #[case("mark_bad", InteractionKind::MarkBad)]
    fn parses_wire_names(#[case] input: &str, #[case] expected: InteractionKind) {
        assert_eq!(input.parse::<InteractionKind>().unwrap(), expected);
        assert_eq!(expected.as_str(), input);
    }

    #[rstest]
    #[case("")]
    #[case("Recall")]
    #[case("mark-good")]
    #[case("click")]
    fn rejects_unknown_kinds(#[case] input: &str) {
        let err = input.parse::<InteractionKind>().unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::InvalidKind);
    }

    #[test]
    fn node_and_edge_kinds_partition_the_taxonomy() {
        for kind in InteractionKind::ALL {
            assert_ne!(kind.event_kind().is_some(), kind.edge_kind().is_some());
        }
        assert!(InteractionKind::Recall.creates_event());
        assert!(!InteractionKind::MarkBad.creates_event());
    }

    #[test]
    fn graph_names() {
        assert_eq!(EventKind::Workspace.node_label(), "WorkspaceEvent");
        assert_eq!(EdgeKind::MarkGood.relationship_type(), "MARK_GOOD");
        assert_eq!(EdgeKind::Keep.interaction_kind(), InteractionKind::Keep);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&InteractionKind::MarkBad).unwrap();
        assert_eq!(json, "\"mark_bad\"");
    }
}
