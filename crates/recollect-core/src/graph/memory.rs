//! In-memory user graph

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use super::types::{Edge, Node};
use super::user_graph::{check_edge, UserGraph};
use crate::error::GraphError;

#[derive(Debug, Default)]
struct Inner {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index_by_node_id: HashMap<Uuid, usize>,
    index_by_edge_id: HashMap<Uuid, usize>,
}

/// Graph held in process memory, in insertion order
#[derive(Debug, Default)]
pub struct InMemoryUserGraph {
    inner: RwLock<Inner>,
}

impl InMemoryUserGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, GraphError> {
        self.inner
            .read()
            .map_err(|e| GraphError::Backend(format!("graph lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, GraphError> {
        self.inner
            .write()
            .map_err(|e| GraphError::Backend(format!("graph lock poisoned: {}", e)))
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, offset: usize, limit: usize) -> Vec<T> {
    items.skip(offset).take(limit).collect()
}

impl UserGraph for InMemoryUserGraph {
    fn add_node(&self, node: Node) -> Result<(), GraphError> {
        let mut inner = self.write()?;
        if let Some(&idx) = inner.index_by_node_id.get(&node.id) {
            let existing = &mut inner.nodes[idx];
            if existing.user_id != node.user_id {
                return Err(GraphError::OwnerMismatch(format!("node {}", node.id)));
            }
            if existing.label != node.label {
                return Err(GraphError::LabelConflict {
                    id: node.id.to_string(),
                    existing: existing.label.clone(),
                    requested: node.label,
                });
            }
            existing.properties.extend(node.properties);
            existing.last_visited = existing.last_visited.max(node.last_visited);
            return Ok(());
        }

        let idx = inner.nodes.len();
        inner.index_by_node_id.insert(node.id, idx);
        inner.nodes.push(node);
        Ok(())
    }

    fn add_edge(&self, start_node: &Node, end_node: &Node, edge: Edge) -> Result<(), GraphError> {
        check_edge(start_node, end_node, &edge)?;

        let mut inner = self.write()?;
        for id in [start_node.id, end_node.id] {
            if !inner.index_by_node_id.contains_key(&id) {
                return Err(GraphError::NodeNotFound(id.to_string()));
            }
        }

        if let Some(&idx) = inner.index_by_edge_id.get(&edge.id) {
            inner.edges[idx].properties.extend(edge.properties);
            return Ok(());
        }

        let idx = inner.edges.len();
        inner.index_by_edge_id.insert(edge.id, idx);
        inner.edges.push(edge);
        Ok(())
    }

    fn get_node(&self, id: Uuid) -> Result<Option<Node>, GraphError> {
        let inner = self.read()?;
        Ok(inner
            .index_by_node_id
            .get(&id)
            .and_then(|&idx| inner.nodes.get(idx))
            .cloned())
    }

    fn nodes(&self, label: Option<&str>, offset: usize, limit: usize) -> Result<Vec<Node>, GraphError> {
        let inner = self.read()?;
        let matching = inner
            .nodes
            .iter()
            .filter(|n| label.map_or(true, |l| n.label == l))
            .cloned();
        Ok(page(matching, offset, limit))
    }

    fn edges(&self, offset: usize, limit: usize) -> Result<Vec<Edge>, GraphError> {
        let inner = self.read()?;
        Ok(page(inner.edges.iter().cloned(), offset, limit))
    }

    fn get_nodes_by_user_id(&self, user_id: Uuid, offset: usize, limit: usize) -> Result<Vec<Node>, GraphError> {
        let inner = self.read()?;
        let matching = inner.nodes.iter().filter(|n| n.user_id == user_id).cloned();
        Ok(page(matching, offset, limit))
    }

    fn get_edges_by_user_id(&self, user_id: Uuid, offset: usize, limit: usize) -> Result<Vec<Edge>, GraphError> {
        let inner = self.read()?;
        let matching = inner.edges.iter().filter(|e| e.user_id == user_id).cloned();
        Ok(page(matching, offset, limit))
    }

    fn count_nodes(&self, label: Option<&str>) -> Result<usize, GraphError> {
        let inner = self.read()?;
        Ok(inner
            .nodes
            .iter()
            .filter(|n| label.map_or(true, |l| n.label == l))
            .count())
    }

    fn count_edges(&self, relationship_type: Option<&str>) -> Result<usize, GraphError> {
        let inner = self.read()?;
        Ok(inner
            .edges
            .iter()
            .filter(|e| relationship_type.map_or(true, |t| e.relationship_type == t))
            .count())
    }

    fn delete_all(&self) -> Result<(), GraphError> {
        let mut inner = self.write()?;
        *inner = Inner::default();
        Ok(())
    }
}
