//! Outbound events and the publisher that stamps them with a header.

use std::sync::Arc;

use bus::Bus;
use common::{EventId, Header, Topic};
use domain::{
    Notification, NotificationContent, Order, OrderConfirmed, OrderPickedAndPacked, OrderReceived,
};

use crate::error::{Result, SagaError};

/// A header-less event produced by a stage or by ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    OrderReceived(Order),
    OrderConfirmed(Order),
    OrderPickedAndPacked(Order),
    Notification(NotificationContent),
}

impl OutboundMessage {
    /// The topic this message belongs on.
    pub fn topic(&self) -> Topic {
        match self {
            OutboundMessage::OrderReceived(_) => Topic::OrderReceived,
            OutboundMessage::OrderConfirmed(_) => Topic::OrderConfirmed,
            OutboundMessage::OrderPickedAndPacked(_) => Topic::OrderPickedAndPacked,
            OutboundMessage::Notification(_) => Topic::Notification,
        }
    }

    /// Serializes the message as a full event carrying `header`.
    pub fn encode(self, header: Header) -> serde_json::Result<Vec<u8>> {
        match self {
            OutboundMessage::OrderReceived(order) => {
                serde_json::to_vec(&OrderReceived { header, order })
            }
            OutboundMessage::OrderConfirmed(order) => {
                serde_json::to_vec(&OrderConfirmed { header, order })
            }
            OutboundMessage::OrderPickedAndPacked(order) => {
                serde_json::to_vec(&OrderPickedAndPacked { header, order })
            }
            OutboundMessage::Notification(content) => {
                serde_json::to_vec(&Notification::new(header, content))
            }
        }
    }
}

/// A `(topic, payload)` pair returned by a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: Topic,
    pub message: OutboundMessage,
}

impl Outbound {
    /// Targets the topic that matches the message type.
    pub fn new(message: OutboundMessage) -> Self {
        Self {
            topic: message.topic(),
            message,
        }
    }

    /// Returns the order carried by the message, if any.
    pub fn order(&self) -> Option<&Order> {
        match &self.message {
            OutboundMessage::OrderReceived(order)
            | OutboundMessage::OrderConfirmed(order)
            | OutboundMessage::OrderPickedAndPacked(order) => Some(order),
            OutboundMessage::Notification(_) => None,
        }
    }

    /// Returns the notification content, if this is a notification.
    pub fn notification(&self) -> Option<&NotificationContent> {
        match &self.message {
            OutboundMessage::Notification(content) => Some(content),
            _ => None,
        }
    }
}

impl From<OutboundMessage> for Outbound {
    fn from(message: OutboundMessage) -> Self {
        Self::new(message)
    }
}

/// Publishes outbound events, minting a fresh [`Header`] for each.
#[derive(Clone)]
pub struct Publisher {
    bus: Arc<dyn Bus>,
}

impl Publisher {
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self { bus }
    }

    /// Publishes one event and returns the id it was published under.
    ///
    /// Returns as soon as the bus has taken the message; there is no
    /// delivery acknowledgement.
    #[tracing::instrument(skip(self, outbound), fields(topic = %outbound.topic))]
    pub async fn publish(&self, outbound: Outbound) -> Result<EventId> {
        let topic = outbound.topic;
        let header = Header::new();
        let id = header.id.clone();
        let payload = outbound.message.encode(header).map_err(SagaError::Encode)?;

        match self.bus.publish(topic, payload).await {
            Ok(()) => {
                metrics::counter!("events_published_total", "topic" => topic.as_str())
                    .increment(1);
                tracing::debug!(event_id = %id, "event published");
                Ok(id)
            }
            Err(e) => {
                metrics::counter!("publish_failures_total", "topic" => topic.as_str())
                    .increment(1);
                Err(SagaError::Bus(e))
            }
        }
    }
}
