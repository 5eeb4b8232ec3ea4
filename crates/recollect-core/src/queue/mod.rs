//! Work queue
//!
//! Interactions are processed asynchronously: the API enqueues them and
//! returns, and a worker drains the queue. Delivery is at least once and
//! unordered, so handlers must be idempotent.

mod memory;
mod message;
mod unordered;

pub use memory::{InMemoryQueue, DEFAULT_MAX_RECEIVE_COUNT, MAX_BATCH_SIZE};
pub use message::{HandleResult, Message, Receipt};
pub use unordered::{poll_and_handle_serially, MessageHandler, UnorderedQueue};
