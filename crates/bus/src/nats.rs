//! NATS JetStream implementation of the bus.

use std::time::Duration;

use async_nats::Client;
use async_nats::jetstream::consumer::{AckPolicy, DeliverPolicy, pull};
use async_nats::jetstream::{self, Message, stream};
use async_trait::async_trait;
use common::Topic;
use futures_util::StreamExt;

use crate::{Bus, BusError, BusMessage, BusResult, Subscription};

/// The JetStream stream holding every fulfillment topic.
pub const STREAM_NAME: &str = "ORDER_FULFILLMENT";

/// How long the stream retains messages. Matches the dedup ledger TTL so
/// every redelivery still falls inside the dedup window.
pub const STREAM_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// How long the server waits for an ack before redelivering.
const ACK_WAIT: Duration = Duration::from_secs(30);

/// Bus implementation over NATS JetStream.
///
/// All topics live in one persistent stream. Each subscription is a durable
/// pull consumer named `<consumer_name>-<topic>`, so:
///
/// - messages published while a service is down are delivered when it
///   comes back
/// - instances of the same service share one consumer instead of each
///   receiving every message
/// - a message that was not acknowledged is redelivered after `ACK_WAIT`
///
/// # Example
/// ```rust,no_run
/// use bus::{Bus, NatsBus};
/// use common::Topic;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = NatsBus::connect("nats://localhost:4222", "inventory").await?;
/// bus.publish(Topic::OrderConfirmed, b"{}".to_vec()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NatsBus {
    client: Client,
    jetstream: jetstream::Context,
    consumer_name: String,
}

impl NatsBus {
    /// Wraps an already-connected client. The stream must already exist.
    pub fn new(client: Client, consumer_name: impl Into<String>) -> Self {
        Self {
            jetstream: jetstream::new(client.clone()),
            client,
            consumer_name: consumer_name.into(),
        }
    }

    /// Connects to the server at `url` and makes sure the stream exists.
    pub async fn connect(url: &str, consumer_name: impl Into<String>) -> BusResult<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        tracing::info!(%url, "connected to NATS");

        let bus = Self::new(client, consumer_name);
        bus.ensure_stream().await?;
        Ok(bus)
    }

    /// Creates the fulfillment stream unless it already exists.
    pub async fn ensure_stream(&self) -> BusResult<()> {
        let config = stream::Config {
            name: STREAM_NAME.to_string(),
            subjects: Topic::ALL
                .iter()
                .map(|topic| topic.as_str().to_string())
                .collect(),
            max_age: STREAM_MAX_AGE,
            ..Default::default()
        };

        self.jetstream
            .get_or_create_stream(config)
            .await
            .map_err(|e| BusError::Connection(format!("stream {STREAM_NAME}: {e}")))?;
        tracing::debug!(stream = STREAM_NAME, "stream ready");
        Ok(())
    }

    /// Flushes messages still buffered in the client.
    pub async fn flush(&self) -> BusResult<()> {
        self.client
            .flush()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn durable_name(&self, topic: Topic) -> String {
        format!("{}-{}", self.consumer_name, topic)
    }
}

#[async_trait]
impl Bus for NatsBus {
    async fn subscribe(&self, topic: Topic) -> BusResult<Box<dyn Subscription>> {
        let stream = self
            .jetstream
            .get_stream(STREAM_NAME)
            .await
            .map_err(|e| BusError::Subscribe(format!("{topic}: {e}")))?;

        let durable = self.durable_name(topic);
        let consumer: jetstream::consumer::PullConsumer = stream
            .get_or_create_consumer(
                &durable,
                pull::Config {
                    durable_name: Some(durable.clone()),
                    filter_subject: topic.as_str().to_string(),
                    deliver_policy: DeliverPolicy::All,
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: ACK_WAIT,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BusError::Subscribe(format!("{topic}: {e}")))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| BusError::Subscribe(format!("{topic}: {e}")))?;

        tracing::info!(%topic, consumer = %durable, "durable consumer attached");
        Ok(Box::new(NatsSubscription {
            topic,
            messages,
            pending: None,
        }))
    }

    /// Sends the message without waiting for the stream's publish ack.
    async fn publish(&self, topic: Topic, payload: Vec<u8>) -> BusResult<()> {
        self.jetstream
            .publish(topic.as_str(), payload.into())
            .await
            .map(drop)
            .map_err(|e| BusError::Publish(format!("{topic}: {e}")))
    }
}

struct NatsSubscription {
    topic: Topic,
    messages: pull::Stream,
    /// Delivered but not yet acknowledged.
    pending: Option<Message>,
}

#[async_trait]
impl Subscription for NatsSubscription {
    async fn poll(&mut self, timeout: Duration) -> BusResult<Option<BusMessage>> {
        match tokio::time::timeout(timeout, self.messages.next()).await {
            Err(_elapsed) => Ok(None),
            Ok(None) => Err(BusError::Closed(self.topic)),
            Ok(Some(Err(e))) => Err(BusError::Receive(format!("{}: {e}", self.topic))),
            Ok(Some(Ok(message))) => {
                let payload = message.payload.to_vec();
                self.pending = Some(message);
                Ok(Some(BusMessage::new(self.topic, payload)))
            }
        }
    }

    async fn ack(&mut self) -> BusResult<()> {
        match self.pending.take() {
            Some(message) => message
                .ack()
                .await
                .map_err(|e| BusError::Ack(format!("{}: {e}", self.topic))),
            None => Ok(()),
        }
    }

    fn topic(&self) -> Topic {
        self.topic
    }
}
