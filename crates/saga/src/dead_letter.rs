//! Routing of unprocessable messages to the dead-letter queue.

use std::sync::Arc;

use bus::Bus;
use common::{Header, Topic};
use domain::{DeadLetterPayload, OrderError};

use crate::error::SagaError;

/// The single failure sink of the consumer core.
///
/// Wraps the original message in an [`OrderError`] and publishes it on
/// [`Topic::DeadLetterQueue`]. There is no retry and no classification; a
/// record that cannot be published is logged and dropped.
#[derive(Clone)]
pub struct DeadLetterRouter {
    bus: Arc<dyn Bus>,
}

impl DeadLetterRouter {
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self { bus }
    }

    /// Publishes `event` as a dead letter, annotated with `cause`.
    ///
    /// Returns whether the record reached the bus.
    #[tracing::instrument(skip(self, event, cause), fields(source_topic = %source_topic, kind = event.kind()))]
    pub async fn route(
        &self,
        source_topic: Topic,
        event: DeadLetterPayload,
        cause: &SagaError,
    ) -> bool {
        let record = OrderError {
            header: Header::new(),
            source_topic,
            reason: cause.to_string(),
            event,
        };
        let id = record.header.id.clone();

        let payload = match serde_json::to_vec(&record) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, cause = %cause, "failed to encode dead letter");
                return false;
            }
        };

        match self.bus.publish(Topic::DeadLetterQueue, payload).await {
            Ok(()) => {
                metrics::counter!("dead_letters_total", "source_topic" => source_topic.as_str())
                    .increment(1);
                tracing::warn!(event_id = %id, cause = %cause, "message dead-lettered");
                true
            }
            Err(e) => {
                metrics::counter!("publish_failures_total", "topic" => Topic::DeadLetterQueue.as_str())
                    .increment(1);
                tracing::error!(error = %e, cause = %cause, "failed to publish dead letter");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::InMemoryBus;

    #[tokio::test]
    async fn test_route_publishes_order_error() {
        let bus = InMemoryBus::new();
        let router = DeadLetterRouter::new(Arc::new(bus.clone()));
        let cause = SagaError::StageFailed {
            stage: "inventory".to_string(),
            reason: "out of stock".to_string(),
        };

        let routed = router
            .route(
                Topic::OrderReceived,
                DeadLetterPayload::raw(b"{\"bad\":"),
                &cause,
            )
            .await;
        assert!(routed);

        let published = bus.published(Topic::DeadLetterQueue).await;
        assert_eq!(published.len(), 1);
        let record: OrderError = serde_json::from_slice(&published[0]).unwrap();
        assert_eq!(record.source_topic, Topic::OrderReceived);
        assert_eq!(record.reason, "Stage 'inventory' failed: out of stock");
        assert_eq!(record.event, DeadLetterPayload::Raw("{\"bad\":".to_string()));
    }

    #[tokio::test]
    async fn test_route_failure_does_not_propagate() {
        let bus = InMemoryBus::new();
        bus.set_fail_on_publish(true).await;
        let router = DeadLetterRouter::new(Arc::new(bus.clone()));
        let cause = SagaError::StageFailed {
            stage: "shipper".to_string(),
            reason: "x".to_string(),
        };

        let routed = router
            .route(Topic::OrderPickedAndPacked, DeadLetterPayload::raw(b""), &cause)
            .await;
        assert!(!routed);
        assert_eq!(bus.message_count(Topic::DeadLetterQueue).await, 0);
    }
}
