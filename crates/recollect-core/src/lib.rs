//! re:collect core - interaction tracking pipeline
//!
//! This crate provides everything behind the `POST /interaction` endpoint:
//!
//! - **Interaction**: the six interaction kinds, wire payloads and queued work units
//! - **Validation**: structural checks on raw payloads
//! - **Resolver**: reuse a supplied event ID or mint one for event-creating kinds
//! - **Publisher**: hand resolved interactions to the work queue, degrading to `retry`
//! - **Queue**: unordered at-least-once queue contract and an in-memory queue
//! - **Processor**: materialise queued interactions into the user graph and records
//! - **Graph**: per-user graph of events, artifacts and labelled edges
//! - **Persistence**: interaction records in memory or SQLite
//! - **Work loop**: exponential backoff loop driving the processor
//! - **Config**: queue, publisher, worker and processor settings
//!
//! # Architecture
//!
//! ```text
//! payload → validate → resolve → publish ─┐      (request path)
//!                                         ▼
//!                                       queue
//!                                         │
//!              graph + records ← process ◄┘      (worker)
//! ```
//!
//! Request handling never waits on the graph. Interactions belonging to the
//! same event may be processed in any order.

pub mod config;
pub mod error;
pub mod graph;
pub mod interaction;
pub mod persistence;
pub mod processor;
pub mod publisher;
pub mod queue;
pub mod resolver;
pub mod validation;
pub mod work_loop;

pub use config::{
    ConfigError, FlagsConfig, ProcessorConfig, PublisherConfig, QueueConfig, RecollectConfig,
    StorageConfig, WorkerConfig,
};
pub use error::{GraphError, PersistenceError, QueueError, RecollectError, Result, ValidationError, ValidationErrorKind};
pub use graph::{Edge, InMemoryUserGraph, Node, UserGraph};
pub use interaction::{
    AckStatus, Action, ArtifactId, EventId, GraphWrite, InteractionKind, PostPayload, PostResponse, QueuedInteraction,
};
pub use persistence::{InMemoryInteractionRecords, InteractionRecord, InteractionRecords, SqliteInteractionRecords};
pub use processor::InteractionProcessor;
pub use publisher::{InteractionPublisher, InteractionQueue};
pub use queue::{poll_and_handle_serially, HandleResult, InMemoryQueue, Message, MessageHandler, UnorderedQueue};
pub use work_loop::{exp_backoff_work_loop, fixed_interval_work_loop, Backoff};
