//! Async processor
//!
//! Applies queued interactions to the user graph and the interaction records.
//! Every write is keyed by a deterministic ID, so redelivered messages are
//! harmless. Interactions that conflict with what the graph already holds
//! (another user's node, an ID reused under a different label) are dropped
//! without a record; only backend failures are retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ProcessorConfig;
use crate::error::RecollectError;
use crate::graph::{Edge, Node, UserGraph};
use crate::interaction::{GraphWrite, QueuedInteraction};
use crate::persistence::{InteractionRecord, InteractionRecords};
use crate::queue::{HandleResult, Message, MessageHandler};

/// Queue handler that materialises interactions
pub struct InteractionProcessor {
    graph: Arc<dyn UserGraph>,
    records: Arc<dyn InteractionRecords>,
    orphan_retry_delay: Duration,
    max_orphan_retries: u32,
}

impl InteractionProcessor {
    pub fn new(
        graph: Arc<dyn UserGraph>,
        records: Arc<dyn InteractionRecords>,
        config: &ProcessorConfig,
    ) -> Self {
        Self {
            graph,
            records,
            orphan_retry_delay: config.orphan_retry_delay(),
            max_orphan_retries: config.max_orphan_retries,
        }
    }

    /// Apply one interaction, given how many deliveries of it already failed
    pub fn apply(&self, interaction: &QueuedInteraction, failures: u32) -> Result<HandleResult, RecollectError> {
        let user_id = interaction.user_id;

        match interaction.action.graph_write() {
            GraphWrite::Event(kind) => {
                let node = Node::event(
                    user_id,
                    kind,
                    interaction.event_id,
                    interaction.timestamp,
                    interaction.metadata.as_ref(),
                );
                self.graph.add_node(node)?;
            }
            GraphWrite::Edge(kind, artifact_id) => {
                let event = match self.graph.get_node(interaction.event_id.0)? {
                    Some(node) if node.is_event() && node.user_id == user_id => node,
                    _ => return Ok(self.orphaned(interaction, failures)),
                };

                let artifact = Node::artifact(user_id, artifact_id, interaction.timestamp);
                self.graph.add_node(artifact.clone())?;

                let edge = Edge::interaction(
                    user_id,
                    kind,
                    interaction.event_id,
                    artifact_id,
                    interaction.id,
                    interaction.timestamp,
                );
                self.graph.add_edge(&event, &artifact, edge)?;
            }
        }

        self.records.upsert(&InteractionRecord::from(interaction))?;

        tracing::debug!(
            interaction_id = %interaction.id,
            %user_id,
            event_id = %interaction.event_id,
            kind = %interaction.kind(),
            "Applied interaction"
        );
        Ok(HandleResult::Ok)
    }

    /// Edge whose event is not in the graph (yet)
    fn orphaned(&self, interaction: &QueuedInteraction, failures: u32) -> HandleResult {
        if failures >= self.max_orphan_retries {
            tracing::warn!(
                interaction_id = %interaction.id,
                event_id = %interaction.event_id,
                failures,
                "Dropping interaction, event never appeared"
            );
            return HandleResult::Ok;
        }

        tracing::info!(
            interaction_id = %interaction.id,
            event_id = %interaction.event_id,
            failures,
            "Event not found, retrying later"
        );
        HandleResult::RetryLater(self.orphan_retry_delay)
    }
}

#[async_trait]
impl MessageHandler<QueuedInteraction> for InteractionProcessor {
    async fn handle(&self, message: &Message<QueuedInteraction>) -> Result<HandleResult, RecollectError> {
        match self.apply(&message.content, message.failures) {
            Ok(result) => Ok(result),
            Err(e) if e.is_permanent() => {
                tracing::warn!(
                    interaction_id = %message.content.id,
                    user_id = %message.content.user_id,
                    event_id = %message.content.event_id,
                    kind = %message.content.kind(),
                    "Dropping interaction that conflicts with the graph: {}",
                    e
                );
                Ok(HandleResult::Ok)
            }
            Err(e) => {
                tracing::warn!(
                    interaction_id = %message.content.id,
                    failures = message.failures,
                    "Failed to apply interaction: {}",
                    e
                );
                Ok(HandleResult::RetryNow)
            }
        }
    }
}
