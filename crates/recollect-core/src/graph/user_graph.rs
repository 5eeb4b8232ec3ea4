//! User graph contract

use uuid::Uuid;

use super::types::{Edge, Node};
use crate::error::GraphError;

/// Shared contract for graphs whose objects are owned by a user
pub trait UserGraph: Send + Sync {
    /// Create a node, or merge properties into the existing one with that ID.
    ///
    /// The existing node must have the same owner and label.
    fn add_node(&self, node: Node) -> Result<(), GraphError>;

    /// Create or update an edge between two existing nodes.
    ///
    /// Self-loops are rejected, and nodes and edge must share an owner.
    fn add_edge(&self, start_node: &Node, end_node: &Node, edge: Edge) -> Result<(), GraphError>;

    fn get_node(&self, id: Uuid) -> Result<Option<Node>, GraphError>;

    fn nodes(&self, label: Option<&str>, offset: usize, limit: usize) -> Result<Vec<Node>, GraphError>;

    fn edges(&self, offset: usize, limit: usize) -> Result<Vec<Edge>, GraphError>;

    fn get_nodes_by_user_id(&self, user_id: Uuid, offset: usize, limit: usize) -> Result<Vec<Node>, GraphError>;

    fn get_edges_by_user_id(&self, user_id: Uuid, offset: usize, limit: usize) -> Result<Vec<Edge>, GraphError>;

    fn count_nodes(&self, label: Option<&str>) -> Result<usize, GraphError>;

    fn count_edges(&self, relationship_type: Option<&str>) -> Result<usize, GraphError>;

    fn delete_all(&self) -> Result<(), GraphError>;
}

pub(crate) fn check_edge(start_node: &Node, end_node: &Node, edge: &Edge) -> Result<(), GraphError> {
    if start_node.id == end_node.id {
        return Err(GraphError::SelfLoop(start_node.id.to_string()));
    }
    if start_node.user_id != end_node.user_id || end_node.user_id != edge.user_id {
        return Err(GraphError::OwnerMismatch(format!(
            "edge {} between {} and {}",
            edge.id, start_node.id, end_node.id
        )));
    }
    Ok(())
}
