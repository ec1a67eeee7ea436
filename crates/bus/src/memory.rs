//! In-memory implementation of the bus for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::Topic;
use tokio::sync::{Notify, RwLock};
use tokio::time::Instant;

use crate::{Bus, BusError, BusMessage, BusResult, Subscription};

#[derive(Debug, Default)]
struct InMemoryBusState {
    topics: HashMap<Topic, Vec<Vec<u8>>>,
    acked: HashMap<Topic, usize>,
    fail_on_publish: bool,
    fail_on_subscribe: bool,
}

/// Bus backed by a per-topic append-only log.
///
/// Every subscription starts at the earliest message of its topic and
/// advances its own cursor, so messages published before a consumer
/// subscribed are still delivered. Cloning shares the same log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBus {
    state: Arc<RwLock<InMemoryBusState>>,
    notify: Arc<Notify>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw bytes to a topic, bypassing publish failure injection.
    ///
    /// Used to simulate redelivery and malformed producers.
    pub async fn inject(&self, topic: Topic, payload: impl Into<Vec<u8>>) {
        self.state
            .write()
            .await
            .topics
            .entry(topic)
            .or_default()
            .push(payload.into());
        self.notify.notify_waiters();
    }

    /// Returns every payload published on `topic`, oldest first.
    pub async fn published(&self, topic: Topic) -> Vec<Vec<u8>> {
        self.state
            .read()
            .await
            .topics
            .get(&topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of messages published on `topic`.
    pub async fn message_count(&self, topic: Topic) -> usize {
        self.state
            .read()
            .await
            .topics
            .get(&topic)
            .map_or(0, Vec::len)
    }

    /// Returns how many delivered messages on `topic` were acknowledged.
    pub async fn acked_count(&self, topic: Topic) -> usize {
        self.state
            .read()
            .await
            .acked
            .get(&topic)
            .copied()
            .unwrap_or(0)
    }

    /// Makes subsequent publishes fail.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().await.fail_on_publish = fail;
    }

    /// Makes subsequent subscribes fail.
    pub async fn set_fail_on_subscribe(&self, fail: bool) {
        self.state.write().await.fail_on_subscribe = fail;
    }
}

#[async_trait]
impl Bus for InMemoryBus {
    async fn subscribe(&self, topic: Topic) -> BusResult<Box<dyn Subscription>> {
        if self.state.read().await.fail_on_subscribe {
            return Err(BusError::Subscribe(format!("{topic}: bus unavailable")));
        }
        Ok(Box::new(InMemorySubscription {
            topic,
            cursor: 0,
            unacked: false,
            state: Arc::clone(&self.state),
            notify: Arc::clone(&self.notify),
        }))
    }

    async fn publish(&self, topic: Topic, payload: Vec<u8>) -> BusResult<()> {
        let mut state = self.state.write().await;
        if state.fail_on_publish {
            return Err(BusError::Publish(format!("{topic}: bus unavailable")));
        }
        state.topics.entry(topic).or_default().push(payload);
        drop(state);

        self.notify.notify_waiters();
        Ok(())
    }
}

struct InMemorySubscription {
    topic: Topic,
    cursor: usize,
    unacked: bool,
    state: Arc<RwLock<InMemoryBusState>>,
    notify: Arc<Notify>,
}

impl InMemorySubscription {
    async fn next_pending(&mut self) -> Option<Vec<u8>> {
        let state = self.state.read().await;
        let payload = state.topics.get(&self.topic)?.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(payload)
    }
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn poll(&mut self, timeout: Duration) -> BusResult<Option<BusMessage>> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register for wakeups before checking so a publish in between is not missed.
            let notify = Arc::clone(&self.notify);
            let notified = notify.notified();
            if let Some(payload) = self.next_pending().await {
                self.unacked = true;
                return Ok(Some(BusMessage::new(self.topic, payload)));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&mut self) -> BusResult<()> {
        if std::mem::take(&mut self.unacked) {
            *self.state.write().await.acked.entry(self.topic).or_default() += 1;
        }
        Ok(())
    }

    fn topic(&self) -> Topic {
        self.topic
    }
}
