//! Messages delivered by a queue and the verdicts handlers return for them

use std::time::Duration;

/// A message retrieved from a queue
#[derive(Debug, Clone, PartialEq)]
pub struct Message<T> {
    /// Decoded message body
    pub content: T,
    /// Number of times delivery of this message has failed so far
    pub failures: u32,
    /// Implementation-specific handle used to acknowledge the message
    pub receipt: Receipt,
}

/// Identifies one delivery of a message.
///
/// A redelivered message gets a new receipt handle; only the latest one can
/// acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Receipt {
    pub message_id: String,
    pub handle: String,
}

/// Result of handling one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleResult {
    /// Message was handled and can be marked as processed
    Ok,
    /// Redeliver as soon as possible
    RetryNow,
    /// Redeliver after the given delay
    RetryLater(Duration),
}

impl HandleResult {
    pub fn label(&self) -> &'static str {
        match self {
            HandleResult::Ok => "ok",
            HandleResult::RetryNow => "retry",
            HandleResult::RetryLater(_) => "retry_later",
        }
    }
}
