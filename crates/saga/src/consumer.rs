//! The idempotent polling consumer shared by every stage.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bus::{Bus, BusError, Subscription};
use common::Topic;
use domain::{DeadLetterPayload, Event};
use ledger::DedupLedger;
use tokio::sync::watch;

use crate::dead_letter::DeadLetterRouter;
use crate::error::{Result, SagaError};
use crate::publisher::Publisher;
use crate::stage::Stage;

/// Default poll window.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default pause after a failed poll.
pub const DEFAULT_POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Tunables for a consumer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// How long one poll blocks waiting for a message.
    pub poll_timeout: Duration,
    /// How long a processed event id is remembered.
    pub dedup_ttl: Duration,
    /// How long to wait before polling again after a poll error.
    pub poll_error_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            dedup_ttl: ledger::DEFAULT_TTL,
            poll_error_backoff: DEFAULT_POLL_ERROR_BACKOFF,
        }
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The stage ran; `published` outbound events reached the bus.
    Processed { published: usize },
    /// The event id was already in the ledger.
    Duplicate,
    /// The message was handed to the dead-letter router.
    DeadLettered,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Processed { .. } => "processed",
            Outcome::Duplicate => "duplicate",
            Outcome::DeadLettered => "dead_lettered",
        }
    }
}

/// Polls one topic, deduplicates, runs the stage and forwards its output.
///
/// Messages are handled strictly one at a time. Every failure after
/// subscription is isolated to the message that caused it.
pub struct EventConsumer<S: Stage> {
    stage: S,
    bus: Arc<dyn Bus>,
    ledger: Arc<dyn DedupLedger>,
    publisher: Publisher,
    dead_letters: DeadLetterRouter,
    config: ConsumerConfig,
}

impl<S: Stage> EventConsumer<S> {
    pub fn new(stage: S, bus: Arc<dyn Bus>, ledger: Arc<dyn DedupLedger>) -> Self {
        Self {
            stage,
            publisher: Publisher::new(Arc::clone(&bus)),
            dead_letters: DeadLetterRouter::new(Arc::clone(&bus)),
            bus,
            ledger,
            config: ConsumerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ConsumerConfig) -> Self {
        self.config = config;
        self
    }

    /// The topic this consumer subscribes to.
    pub fn topic(&self) -> Topic {
        S::Input::TOPIC
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    /// Opens the inbound subscription. Failure is fatal for the service.
    pub async fn subscribe(&self) -> Result<Box<dyn Subscription>> {
        self.bus
            .subscribe(self.topic())
            .await
            .map_err(SagaError::Subscribe)
    }

    /// Subscribes and runs the loop until `shutdown` turns true.
    ///
    /// Returns `Ok(())` on shutdown and an error only for fatal conditions:
    /// the subscription could not be opened or its stream ended.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let subscription = self.subscribe().await?;
        self.run_with(subscription, shutdown).await
    }

    /// Runs the loop over an already-open subscription.
    ///
    /// Shutdown is observed once per iteration, so an in-flight poll
    /// completes first. Every handled message is acknowledged, whatever its
    /// outcome; a message is only redelivered if the process dies before
    /// the ack.
    #[tracing::instrument(name = "consumer", skip_all, fields(service = self.stage.name(), topic = %self.topic()))]
    pub async fn run_with(
        &self,
        mut subscription: Box<dyn Subscription>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        tracing::info!("started consuming messages");
        loop {
            if *shutdown.borrow() {
                tracing::info!("consumer stopping");
                return Ok(());
            }

            match subscription.poll(self.config.poll_timeout).await {
                Ok(None) => continue,
                Ok(Some(message)) => {
                    self.handle_message(&message.payload).await;
                    if let Err(e) = subscription.ack().await {
                        tracing::warn!(error = %e, "failed to acknowledge message");
                    }
                }
                Err(BusError::Closed(topic)) => {
                    tracing::error!(%topic, "subscription closed");
                    return Err(SagaError::Bus(BusError::Closed(topic)));
                }
                Err(e) => {
                    tracing::error!(error = %e, "poll failed");
                    tokio::time::sleep(self.config.poll_error_backoff).await;
                }
            }
        }
    }

    /// Handles one raw message end to end.
    pub async fn handle_message(&self, payload: &[u8]) -> Outcome {
        let start = Instant::now();
        let outcome = self.process(payload).await;

        let topic = self.topic().as_str();
        metrics::counter!("consumer_messages_total", "topic" => topic, "outcome" => outcome.as_str())
            .increment(1);
        metrics::histogram!("consumer_handle_seconds", "topic" => topic)
            .record(start.elapsed().as_secs_f64());

        outcome
    }

    async fn process(&self, payload: &[u8]) -> Outcome {
        let event: S::Input = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "failed to decode message");
                return self
                    .dead_letter(DeadLetterPayload::raw(payload), SagaError::Decode(e))
                    .await;
            }
        };

        let id = event.header().id.clone();
        match self.ledger.exists(&id).await {
            Ok(true) => {
                tracing::info!(event_id = %id, "event already handled");
                return Outcome::Duplicate;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(event_id = %id, error = %e, "ledger lookup failed");
                return self.dead_letter(event.into_dead_letter(), e.into()).await;
            }
        }

        // Recorded before the stage runs: a crash from here on drops this
        // event's output rather than risking a second effect on redelivery.
        if let Err(e) = self.ledger.record(&id, self.config.dedup_ttl).await {
            tracing::error!(event_id = %id, error = %e, "ledger write failed");
            return self.dead_letter(event.into_dead_letter(), e.into()).await;
        }

        let outbound = match self.stage.handle(&event).await {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::error!(event_id = %id, error = %e, "stage failed");
                return self.dead_letter(event.into_dead_letter(), e).await;
            }
        };

        let mut published = 0;
        for message in outbound {
            let topic = message.topic;
            match self.publisher.publish(message).await {
                Ok(_) => published += 1,
                Err(e) => {
                    tracing::error!(event_id = %id, %topic, error = %e, "failed to publish event");
                }
            }
        }

        tracing::debug!(event_id = %id, published, "event processed");
        Outcome::Processed { published }
    }

    async fn dead_letter(&self, event: DeadLetterPayload, cause: SagaError) -> Outcome {
        self.dead_letters.route(self.topic(), event, &cause).await;
        Outcome::DeadLettered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::InventoryStage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bus::{BusMessage, BusResult, InMemoryBus};
    use ledger::InMemoryLedger;

    /// Fails every poll and counts the attempts.
    struct BrokenSubscription {
        polls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Subscription for BrokenSubscription {
        async fn poll(&mut self, _timeout: Duration) -> BusResult<Option<BusMessage>> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Err(BusError::Connection("server unreachable".to_string()))
        }

        async fn ack(&mut self) -> BusResult<()> {
            Ok(())
        }

        fn topic(&self) -> Topic {
            Topic::OrderReceived
        }
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Processed { published: 2 }.as_str(), "processed");
        assert_eq!(Outcome::Duplicate.as_str(), "duplicate");
        assert_eq!(Outcome::DeadLettered.as_str(), "dead_lettered");
    }

    #[test]
    fn test_default_config() {
        let config = ConsumerConfig::default();
        assert_eq!(config.poll_timeout, Duration::from_secs(5));
        assert_eq!(config.dedup_ttl, Duration::from_secs(604_800));
        assert_eq!(config.poll_error_backoff, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_topic_comes_from_stage_input() {
        let consumer = EventConsumer::new(
            InventoryStage,
            Arc::new(InMemoryBus::new()),
            Arc::new(InMemoryLedger::new()),
        );
        assert_eq!(consumer.topic(), Topic::OrderReceived);
        assert_eq!(consumer.stage().name(), "inventory");
    }

    #[tokio::test]
    async fn test_stops_when_shutdown_already_set() {
        let consumer = EventConsumer::new(
            InventoryStage,
            Arc::new(InMemoryBus::new()),
            Arc::new(InMemoryLedger::new()),
        );
        let (_tx, rx) = watch::channel(true);
        assert!(consumer.run(rx).await.is_ok());
    }

    #[tokio::test]
    async fn test_poll_errors_back_off() {
        let consumer = EventConsumer::new(
            InventoryStage,
            Arc::new(InMemoryBus::new()),
            Arc::new(InMemoryLedger::new()),
        )
        .with_config(ConsumerConfig {
            poll_error_backoff: Duration::from_millis(50),
            ..ConsumerConfig::default()
        });
        let polls = Arc::new(AtomicUsize::new(0));
        let subscription = Box::new(BrokenSubscription {
            polls: Arc::clone(&polls),
        });
        let (tx, rx) = watch::channel(false);

        let run = consumer.run_with(subscription, rx);
        let stop = async {
            tokio::time::sleep(Duration::from_millis(120)).await;
            tx.send(true).unwrap();
        };
        let (result, ()) = tokio::join!(run, stop);

        assert!(result.is_ok());
        let polls = polls.load(Ordering::SeqCst);
        assert!((1..=4).contains(&polls), "polled {polls} times");
    }
}
