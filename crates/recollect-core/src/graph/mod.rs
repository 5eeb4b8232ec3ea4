//! Per-user interaction graph
//!
//! Events and artifacts are nodes; edge interactions become labelled
//! relationships from an event to an artifact. All writes are idempotent.

mod memory;
mod types;
mod user_graph;

pub use memory::InMemoryUserGraph;
pub use types::{deterministic_id, Edge, Node, ARTIFACT_LABEL};
pub use user_graph::UserGraph;
