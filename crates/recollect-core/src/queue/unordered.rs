//! Unordered, at-least-once queue contract

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::message::{HandleResult, Message};
use crate::error::{QueueError, RecollectError};

/// Contract for an unordered queue of messages.
///
/// Implementations deliver every message at least once, hide a delivered
/// message from other consumers until it is acknowledged or its visibility
/// window lapses, and long-poll in [`retrieve`](Self::retrieve). They make no
/// ordering guarantees.
#[async_trait]
pub trait UnorderedQueue<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Name used in logs
    fn name(&self) -> &str;

    /// Enqueue one item, optionally delaying its first delivery
    async fn enqueue(&self, item: T, delay: Duration) -> Result<(), QueueError> {
        self.enqueue_multiple_with_delay(vec![(item, delay)]).await
    }

    /// Enqueue several items sharing one delay
    async fn enqueue_multiple(&self, items: Vec<T>, delay: Duration) -> Result<(), QueueError> {
        self.enqueue_multiple_with_delay(items.into_iter().map(|item| (item, delay)).collect())
            .await
    }

    /// Enqueue items with individual delays.
    ///
    /// Accepted batch size and maximum delay are implementation-defined.
    async fn enqueue_multiple_with_delay(&self, items: Vec<(T, Duration)>) -> Result<(), QueueError>;

    /// Wait up to `timeout` for up to `limit` messages.
    ///
    /// A zero timeout returns immediately with whatever is available.
    /// Every retrieved message must later be passed to
    /// [`acknowledge`](Self::acknowledge).
    async fn retrieve(&self, timeout: Duration, limit: usize) -> Result<Vec<Message<T>>, QueueError>;

    /// Settle retrieved messages: drop the successful ones, redeliver
    /// `retry_now` immediately and `retry_later` after their delay.
    async fn acknowledge(
        &self,
        successful: Vec<Message<T>>,
        retry_now: Vec<Message<T>>,
        retry_later: Vec<(Message<T>, Duration)>,
    ) -> Result<(), QueueError>;

    /// Approximate number of messages waiting or in flight
    async fn approximate_depth(&self) -> Result<usize, QueueError>;
}

/// Handles one decoded message
#[async_trait]
pub trait MessageHandler<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    async fn handle(&self, message: &Message<T>) -> Result<HandleResult, RecollectError>;
}

/// Poll `queue` once and run `handler` over each message in turn.
///
/// Handler errors count as immediate retries. Returns whether any message was
/// handled successfully, so a batch that only produced retries lets the caller
/// back off.
pub async fn poll_and_handle_serially<T, Q, H>(
    description: &str,
    queue: &Q,
    handler: &H,
    timeout: Duration,
    limit: usize,
) -> Result<bool, QueueError>
where
    T: Send + Sync + std::fmt::Debug + 'static,
    Q: UnorderedQueue<T> + ?Sized,
    H: MessageHandler<T> + ?Sized,
{
    let messages = queue.retrieve(timeout, limit).await?;
    if messages.is_empty() {
        return Ok(false);
    }

    tracing::debug!("Processing {} {} messages...", messages.len(), description);

    let mut ok = Vec::new();
    let mut retries = Vec::new();
    let mut delayed_retries = Vec::new();

    for message in messages {
        let start = Instant::now();
        let result = handler.handle(&message).await;
        tracing::trace!(
            queue = queue.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Handled message"
        );

        match result {
            Ok(HandleResult::Ok) => ok.push(message),
            Ok(HandleResult::RetryNow) => retries.push(message),
            Ok(HandleResult::RetryLater(delay)) => delayed_retries.push((message, delay)),
            Err(e) => {
                tracing::error!(
                    "Exception handling {} message {:?}: {}",
                    description,
                    message.receipt,
                    e
                );
                retries.push(message);
            }
        }
    }

    let (n_ok, n_retry, n_delayed) = (ok.len(), retries.len(), delayed_retries.len());
    queue.acknowledge(ok, retries, delayed_retries).await?;

    tracing::debug!(
        "Batch of {} messages processed ({} ok, {} retries, {} delayed retries)",
        description,
        n_ok,
        n_retry,
        n_delayed
    );
    Ok(n_ok > 0)
}
