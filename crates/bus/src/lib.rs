//! Publish/subscribe capability used by every fulfillment service.
//!
//! The saga core only talks to the bus through [`Bus`] and
//! [`Subscription`], so the consumer loop runs unchanged against:
//!
//! - [`NatsBus`]: production implementation over NATS JetStream
//! - [`InMemoryBus`]: test/dev implementation with replay, raw-byte
//!   injection and failure switches
//!
//! Delivery is at-least-once: a message that was polled but not acknowledged
//! is delivered again, so consumers deduplicate on their own.

mod memory;
mod nats;

pub use memory::InMemoryBus;
pub use nats::{NatsBus, STREAM_MAX_AGE, STREAM_NAME};

use std::time::Duration;

use async_trait::async_trait;
use common::Topic;

/// A message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// The topic this message was published to.
    pub topic: Topic,
    /// The message payload (raw bytes).
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(topic: Topic, payload: Vec<u8>) -> Self {
        Self { topic, payload }
    }
}

/// Errors that can occur when using the bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to publish message: {0}")]
    Publish(String),

    #[error("failed to subscribe to topic: {0}")]
    Subscribe(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("failed to receive message: {0}")]
    Receive(String),

    #[error("failed to acknowledge message: {0}")]
    Ack(String),

    /// The subscription will never yield another message.
    #[error("subscription to {0} closed")]
    Closed(Topic),
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Publish/subscribe transport.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Opens the subscription for `topic`.
    async fn subscribe(&self, topic: Topic) -> BusResult<Box<dyn Subscription>>;

    /// Hands `payload` to the transport for delivery on `topic`.
    ///
    /// Returns once the message is enqueued; it does not wait for a
    /// delivery acknowledgement.
    async fn publish(&self, topic: Topic, payload: Vec<u8>) -> BusResult<()>;
}

/// An open subscription to a single topic.
#[async_trait]
pub trait Subscription: Send {
    /// Waits up to `timeout` for the next message.
    ///
    /// `Ok(None)` means the window elapsed without a message, which is not
    /// an error.
    async fn poll(&mut self, timeout: Duration) -> BusResult<Option<BusMessage>>;

    /// Acknowledges the message most recently returned by [`poll`](Self::poll).
    ///
    /// A message that is never acknowledged is delivered again. Calling this
    /// with nothing outstanding is a no-op.
    async fn ack(&mut self) -> BusResult<()>;

    fn topic(&self) -> Topic;
}

impl std::fmt::Debug for dyn Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bus")
    }
}
