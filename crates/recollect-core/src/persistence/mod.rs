//! Persistence layer for interaction records
//!
//! Every processed interaction is also kept as a flat record, so an event's
//! history can be listed or erased without walking the graph.

mod records;
mod repository;
mod schema;

pub use records::{InMemoryInteractionRecords, InteractionRecord, InteractionRecords};
pub use repository::SqliteInteractionRecords;
pub use schema::{Schema, SCHEMA_VERSION};
