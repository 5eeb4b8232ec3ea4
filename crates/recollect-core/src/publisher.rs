//! Queue publisher
//!
//! The synchronous half of the pipeline: validate, resolve the event, and
//! hand the interaction to the work queue.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::{QueueError, ValidationError};
use crate::interaction::{PostPayload, PostResponse, QueuedInteraction, ResolvedInteraction};
use crate::queue::UnorderedQueue;
use crate::{resolver, validation};

/// Shared handle to the interaction work queue
pub type InteractionQueue = Arc<dyn UnorderedQueue<QueuedInteraction>>;

/// Submits interactions to the work queue
#[derive(Clone)]
pub struct InteractionPublisher {
    queue: InteractionQueue,
    timeout: Duration,
}

impl InteractionPublisher {
    pub fn new(queue: InteractionQueue, timeout: Duration) -> Self {
        Self { queue, timeout }
    }

    pub fn queue(&self) -> &InteractionQueue {
        &self.queue
    }

    /// Validate, resolve and enqueue a raw payload on behalf of `user_id`.
    ///
    /// Validation failures are returned as errors and nothing is queued.
    /// Queue failures are reported in-band as a `retry` response.
    pub async fn submit(
        &self,
        user_id: Uuid,
        payload: &PostPayload,
    ) -> Result<PostResponse, ValidationError> {
        let interaction = validation::validate(payload)?;
        let resolved = resolver::resolve(interaction)?;
        Ok(self.publish(user_id, resolved).await)
    }

    /// Enqueue an already resolved interaction
    pub async fn publish(&self, user_id: Uuid, interaction: ResolvedInteraction) -> PostResponse {
        let event_id = interaction.event_id;
        let queued = QueuedInteraction::new(user_id, interaction);
        let interaction_id = queued.id;
        let kind = queued.kind();

        let result = match tokio::time::timeout(self.timeout, self.queue.enqueue(queued, Duration::ZERO)).await {
            Ok(result) => result,
            Err(_) => Err(QueueError::Timeout(self.timeout)),
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    %user_id,
                    %event_id,
                    %interaction_id,
                    %kind,
                    queue = self.queue.name(),
                    "Queued interaction"
                );
                PostResponse::ok(event_id)
            }
            Err(e) => {
                tracing::warn!(%user_id, %event_id, %kind, "Failed to queue interaction: {}", e);
                PostResponse::retry(format!("Failed to queue interaction, please retry: {}", e), Some(event_id))
            }
        }
    }
}
