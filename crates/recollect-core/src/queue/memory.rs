//! In-process queue with visibility timeouts and delayed delivery

use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use super::message::{Message, Receipt};
use super::unordered::UnorderedQueue;
use crate::error::QueueError;

/// Largest batch accepted by [`InMemoryQueue::enqueue_multiple_with_delay`]
pub const MAX_BATCH_SIZE: usize = 10;

/// Failed deliveries after which a message is moved to the dead-letter list
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 30;

#[derive(Debug)]
struct Entry {
    id: String,
    body: String,
    failures: u32,
    available_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    waiting: VecDeque<Entry>,
    in_flight: HashMap<String, (Entry, Instant)>,
    dead_letters: Vec<Entry>,
}

impl Inner {
    /// Count a failed delivery and schedule the message again, unless it has
    /// used up its deliveries
    fn requeue(&mut self, mut entry: Entry, available_at: Instant, max_receive_count: u32) {
        entry.failures += 1;
        if entry.failures >= max_receive_count {
            tracing::warn!(
                message_id = %entry.id,
                failures = entry.failures,
                "Message exhausted its deliveries, moving to dead letters"
            );
            self.dead_letters.push(entry);
            return;
        }
        entry.available_at = available_at;
        self.waiting.push_back(entry);
    }

    /// Move in-flight messages whose visibility window lapsed back to waiting
    fn reclaim_expired(&mut self, now: Instant, max_receive_count: u32) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(handle, _)| handle.clone())
            .collect();

        for handle in expired {
            if let Some((entry, _)) = self.in_flight.remove(&handle) {
                tracing::debug!(message_id = %entry.id, "Visibility timeout lapsed, redelivering");
                self.requeue(entry, now, max_receive_count);
            }
        }
    }

    /// Earliest instant at which something may become deliverable
    fn next_wakeup(&self) -> Option<Instant> {
        let waiting = self.waiting.iter().map(|e| e.available_at);
        let in_flight = self.in_flight.values().map(|(_, deadline)| *deadline);
        waiting.chain(in_flight).min()
    }
}

/// Queue held entirely in memory.
///
/// Bodies are stored as JSON so the wire format is exercised exactly as it
/// would be against a remote transport. A message that fails
/// `max_receive_count` deliveries is parked in a dead-letter list instead of
/// being redelivered.
pub struct InMemoryQueue<T> {
    name: String,
    visibility_timeout: Duration,
    max_receive_count: u32,
    inner: Mutex<Inner>,
    notify: Notify,
    _content: PhantomData<fn() -> T>,
}

impl<T> InMemoryQueue<T> {
    pub fn new(name: impl Into<String>, visibility_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            visibility_timeout,
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            _content: PhantomData,
        }
    }

    /// Set how many failed deliveries a message gets; values below one are
    /// treated as one
    pub fn with_max_receive_count(mut self, max_receive_count: u32) -> Self {
        self.max_receive_count = max_receive_count.max(1);
        self
    }

    pub fn max_receive_count(&self) -> u32 {
        self.max_receive_count
    }

    /// Number of messages parked in the dead-letter list
    pub fn dead_letter_count(&self) -> Result<usize, QueueError> {
        Ok(self.lock()?.dead_letters.len())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, QueueError> {
        self.inner
            .lock()
            .map_err(|e| QueueError::Unavailable(format!("queue lock poisoned: {}", e)))
    }

    fn settle(inner: &mut Inner, message_receipt: &Receipt) -> Option<Entry> {
        match inner.in_flight.remove(&message_receipt.handle) {
            Some((entry, _)) => Some(entry),
            None => {
                tracing::warn!(
                    message_id = %message_receipt.message_id,
                    "Acknowledged message is no longer in flight (visibility expired?)"
                );
                None
            }
        }
    }
}

impl<T: DeserializeOwned> InMemoryQueue<T> {
    /// Decoded bodies of the dead-lettered messages, oldest first
    pub fn dead_letters(&self) -> Result<Vec<T>, QueueError> {
        let inner = self.lock()?;
        inner
            .dead_letters
            .iter()
            .map(|entry| Ok(serde_json::from_str(&entry.body)?))
            .collect()
    }
}

#[async_trait]
impl<T> UnorderedQueue<T> for InMemoryQueue<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue_multiple_with_delay(&self, items: Vec<(T, Duration)>) -> Result<(), QueueError> {
        if items.len() > MAX_BATCH_SIZE {
            return Err(QueueError::BatchTooLarge {
                size: items.len(),
                limit: MAX_BATCH_SIZE,
            });
        }

        let now = Instant::now();
        let entries = items
            .into_iter()
            .map(|(item, delay)| {
                Ok(Entry {
                    id: Uuid::new_v4().to_string(),
                    body: serde_json::to_string(&item)?,
                    failures: 0,
                    available_at: now + delay,
                })
            })
            .collect::<Result<Vec<_>, QueueError>>()?;

        self.lock()?.waiting.extend(entries);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn retrieve(&self, timeout: Duration, limit: usize) -> Result<Vec<Message<T>>, QueueError> {
        let deadline = Instant::now() + timeout;

        loop {
            // Register interest before inspecting state so an enqueue that
            // lands in between still wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (messages, wakeup) = {
                let mut inner = self.lock()?;
                let now = Instant::now();
                inner.reclaim_expired(now, self.max_receive_count);

                let mut messages = Vec::new();
                let mut remaining = VecDeque::with_capacity(inner.waiting.len());
                while let Some(entry) = inner.waiting.pop_front() {
                    if messages.len() >= limit || entry.available_at > now {
                        remaining.push_back(entry);
                        continue;
                    }
                    match serde_json::from_str::<T>(&entry.body) {
                        Ok(content) => {
                            let receipt = Receipt {
                                message_id: entry.id.clone(),
                                handle: Uuid::new_v4().to_string(),
                            };
                            messages.push(Message {
                                content,
                                failures: entry.failures,
                                receipt: receipt.clone(),
                            });
                            inner
                                .in_flight
                                .insert(receipt.handle, (entry, now + self.visibility_timeout));
                        }
                        Err(e) => {
                            tracing::error!(message_id = %entry.id, "Dropping undecodable message: {}", e);
                        }
                    }
                }
                inner.waiting = remaining;
                (messages, inner.next_wakeup())
            };

            if !messages.is_empty() || Instant::now() >= deadline {
                return Ok(messages);
            }

            let wake_at = wakeup.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn acknowledge(
        &self,
        successful: Vec<Message<T>>,
        retry_now: Vec<Message<T>>,
        retry_later: Vec<(Message<T>, Duration)>,
    ) -> Result<(), QueueError> {
        let mut inner = self.lock()?;
        let now = Instant::now();

        for message in successful {
            Self::settle(&mut inner, &message.receipt);
        }

        let retries = retry_now
            .into_iter()
            .map(|m| (m, Duration::ZERO))
            .chain(retry_later);
        for (message, delay) in retries {
            if let Some(entry) = Self::settle(&mut inner, &message.receipt) {
                inner.requeue(entry, now + delay, self.max_receive_count);
            }
        }

        drop(inner);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn approximate_depth(&self) -> Result<usize, QueueError> {
        let inner = self.lock()?;
        Ok(inner.waiting.len() + inner.in_flight.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecollectError;
    use crate::queue::{poll_and_handle_serially, HandleResult, MessageHandler};
    use std::sync::Arc;

    fn queue() -> InMemoryQueue<String> {
        InMemoryQueue::new("test", Duration::from_secs(30))
    }

    #[tokio::test]
    async fn delivers_enqueued_items() {
        let q = queue();
        q.enqueue_multiple(vec!["a".into(), "b".into()], Duration::ZERO)
            .await
            .unwrap();

        let messages = q.retrieve(Duration::ZERO, 10).await.unwrap();
        let mut contents: Vec<_> = messages.iter().map(|m| m.content.clone()).collect();
        contents.sort();
        assert_eq!(contents, vec!["a", "b"]);
        assert_eq!(q.approximate_depth().await.unwrap(), 2);

        q.acknowledge(messages, vec![], vec![]).await.unwrap();
        assert_eq!(q.approximate_depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn retrieved_messages_are_hidden_until_acknowledged() {
        let q = queue();
        q.enqueue("only".into(), Duration::ZERO).await.unwrap();

        let first = q.retrieve(Duration::ZERO, 10).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(q.retrieve(Duration::ZERO, 10).await.unwrap().is_empty());

        q.acknowledge(vec![], first, vec![]).await.unwrap();
        let again = q.retrieve(Duration::ZERO, 10).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].failures, 1);
    }

    #[tokio::test]
    async fn respects_limit() {
        let q = queue();
        q.enqueue_multiple(vec!["1".into(), "2".into(), "3".into()], Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(q.retrieve(Duration::ZERO, 2).await.unwrap().len(), 2);
        assert_eq!(q.retrieve(Duration::ZERO, 2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_oversized_batches() {
        let q = queue();
        let items = (0..11).map(|i| i.to_string()).collect();
        let err = q.enqueue_multiple(items, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, QueueError::BatchTooLarge { size: 11, limit: 10 }));
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_items_wait_for_their_delay() {
        let q = queue();
        q.enqueue("later".into(), Duration::from_secs(5)).await.unwrap();
        assert!(q.retrieve(Duration::ZERO, 10).await.unwrap().is_empty());

        let messages = q.retrieve(Duration::from_secs(10), 10).await.unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_later_redelivers_after_delay() {
        let q = queue();
        q.enqueue("x".into(), Duration::ZERO).await.unwrap();
        let messages = q.retrieve(Duration::ZERO, 10).await.unwrap();
        let delayed = messages
            .into_iter()
            .map(|m| (m, Duration::from_secs(60)))
            .collect();
        q.acknowledge(vec![], vec![], delayed).await.unwrap();

        assert!(q.retrieve(Duration::from_secs(30), 10).await.unwrap().is_empty());
        let messages = q.retrieve(Duration::from_secs(60), 10).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lapsed_visibility_redelivers() {
        let q: InMemoryQueue<String> = InMemoryQueue::new("short", Duration::from_secs(1));
        q.enqueue("x".into(), Duration::ZERO).await.unwrap();
        let first = q.retrieve(Duration::ZERO, 10).await.unwrap();
        assert_eq!(first.len(), 1);

        let second = q.retrieve(Duration::from_secs(5), 10).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].failures, 1);

        // The stale receipt no longer settles anything
        q.acknowledge(first, vec![], vec![]).await.unwrap();
        assert_eq!(q.approximate_depth().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn long_poll_wakes_on_enqueue() {
        let q = Arc::new(queue());
        let consumer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.retrieve(Duration::from_secs(10), 10).await })
        };
        tokio::task::yield_now().await;
        q.enqueue("wake".into(), Duration::ZERO).await.unwrap();

        let messages = consumer.await.unwrap().unwrap();
        assert_eq!(messages.len(), 1);
    }

    struct Verdicts;

    #[async_trait]
    impl MessageHandler<String> for Verdicts {
        async fn handle(&self, message: &Message<String>) -> Result<HandleResult, RecollectError> {
            match message.content.as_str() {
                "ok" => Ok(HandleResult::Ok),
                "retry" => Ok(HandleResult::RetryNow),
                "later" => Ok(HandleResult::RetryLater(Duration::from_secs(600))),
                _ => Err(RecollectError::Graph(crate::error::GraphError::Backend("boom".into()))),
            }
        }
    }

    #[tokio::test]
    async fn poll_sorts_results_into_acknowledgements() {
        let q = queue();
        q.enqueue_multiple(
            vec!["ok".into(), "retry".into(), "later".into(), "error".into()],
            Duration::ZERO,
        )
        .await
        .unwrap();

        let processed = poll_and_handle_serially("test", &q, &Verdicts, Duration::ZERO, 10)
            .await
            .unwrap();
        assert!(processed);

        // ok is gone, later is delayed; retry and error come straight back
        let mut redelivered: Vec<_> = q
            .retrieve(Duration::ZERO, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        redelivered.sort();
        assert_eq!(redelivered, vec!["error", "retry"]);
        assert_eq!(q.approximate_depth().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn poll_reports_batch_of_only_retries_as_unproductive() {
        let q = queue();
        q.enqueue_multiple(vec!["retry".into(), "error".into()], Duration::ZERO)
            .await
            .unwrap();

        let processed = poll_and_handle_serially("test", &q, &Verdicts, Duration::ZERO, 10)
            .await
            .unwrap();
        assert!(!processed);
        assert_eq!(q.approximate_depth().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn repeatedly_failing_message_is_dead_lettered() {
        let q = queue().with_max_receive_count(3);
        q.enqueue_multiple(vec!["retry".into(), "ok".into()], Duration::ZERO)
            .await
            .unwrap();

        for _ in 0..10 {
            poll_and_handle_serially("test", &q, &Verdicts, Duration::ZERO, 10)
                .await
                .unwrap();
        }

        assert_eq!(q.approximate_depth().await.unwrap(), 0);
        assert_eq!(q.dead_letter_count().unwrap(), 1);
        assert_eq!(q.dead_letters().unwrap(), vec!["retry".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn lapsed_visibility_counts_towards_dead_lettering() {
        let q: InMemoryQueue<String> =
            InMemoryQueue::new("short", Duration::from_secs(1)).with_max_receive_count(2);
        q.enqueue("abandoned".into(), Duration::ZERO).await.unwrap();

        assert_eq!(q.retrieve(Duration::ZERO, 10).await.unwrap().len(), 1);
        assert_eq!(q.retrieve(Duration::from_secs(5), 10).await.unwrap().len(), 1);
        assert!(q.retrieve(Duration::from_secs(5), 10).await.unwrap().is_empty());
        assert_eq!(q.dead_letter_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn poll_reports_idle_queue() {
        let q = queue();
        let processed = poll_and_handle_serially("test", &q, &Verdicts, Duration::ZERO, 10)
            .await
            .unwrap();
        assert!(!processed);
    }
}
