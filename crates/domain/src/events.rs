//! Events exchanged over the bus.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use common::{Header, Topic};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::order::Order;

/// An event type that a stage can consume.
///
/// Every implementor carries its own [`Header`] and knows the topic it is
/// published on.
pub trait Event: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The topic this event is published on.
    const TOPIC: Topic;

    fn header(&self) -> &Header;

    /// Wraps the event for the dead-letter queue.
    fn into_dead_letter(self) -> DeadLetterPayload;
}

/// An order was accepted by ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderReceived {
    pub header: Header,
    pub order: Order,
}

/// Inventory confirmed the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderConfirmed {
    pub header: Header,
    pub order: Order,
}

/// The warehouse picked and packed the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderPickedAndPacked {
    pub header: Header,
    pub order: Order,
}

/// Delivery channel of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Email,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Email => "email",
        }
    }
}

/// The parts of a notification a stage renders; the header is added on publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NotificationContent {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub recipient: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

/// A human-facing message about an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Notification {
    pub header: Header,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub recipient: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(header: Header, content: NotificationContent) -> Self {
        Self {
            header,
            kind: content.kind,
            recipient: content.recipient,
            from: content.from,
            subject: content.subject,
            body: content.body,
        }
    }

    /// Returns the rendered parts without the header.
    pub fn content(&self) -> NotificationContent {
        NotificationContent {
            kind: self.kind,
            recipient: self.recipient.clone(),
            from: self.from.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
        }
    }
}

/// The original message inside a dead-letter record.
///
/// Known events keep their typed form. Bytes that never decoded are kept as
/// text when they are valid UTF-8 and as base64 otherwise, so the exact
/// input can always be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DeadLetterPayload {
    OrderReceived(OrderReceived),
    OrderConfirmed(OrderConfirmed),
    OrderPickedAndPacked(OrderPickedAndPacked),
    Notification(Notification),
    Raw(String),
    RawBase64(String),
}

impl DeadLetterPayload {
    /// Builds the raw fallback from undecodable bytes.
    pub fn raw(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => DeadLetterPayload::Raw(text.to_owned()),
            Err(_) => DeadLetterPayload::RawBase64(BASE64.encode(bytes)),
        }
    }

    /// The undecoded bytes, for the raw variants.
    pub fn raw_bytes(&self) -> Option<Vec<u8>> {
        match self {
            DeadLetterPayload::Raw(text) => Some(text.as_bytes().to_vec()),
            DeadLetterPayload::RawBase64(encoded) => BASE64.decode(encoded).ok(),
            _ => None,
        }
    }

    /// Name of the payload variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DeadLetterPayload::OrderReceived(_) => "OrderReceived",
            DeadLetterPayload::OrderConfirmed(_) => "OrderConfirmed",
            DeadLetterPayload::OrderPickedAndPacked(_) => "OrderPickedAndPacked",
            DeadLetterPayload::Notification(_) => "Notification",
            DeadLetterPayload::Raw(_) => "Raw",
            DeadLetterPayload::RawBase64(_) => "RawBase64",
        }
    }
}

/// A failed message, as published on the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderError {
    pub header: Header,
    /// Topic the original message was consumed from.
    pub source_topic: Topic,
    /// Why the message could not be processed.
    pub reason: String,
    pub event: DeadLetterPayload,
}

impl Event for OrderReceived {
    const TOPIC: Topic = Topic::OrderReceived;

    fn header(&self) -> &Header {
        &self.header
    }

    fn into_dead_letter(self) -> DeadLetterPayload {
        DeadLetterPayload::OrderReceived(self)
    }
}

impl Event for OrderConfirmed {
    const TOPIC: Topic = Topic::OrderConfirmed;

    fn header(&self) -> &Header {
        &self.header
    }

    fn into_dead_letter(self) -> DeadLetterPayload {
        DeadLetterPayload::OrderConfirmed(self)
    }
}

impl Event for OrderPickedAndPacked {
    const TOPIC: Topic = Topic::OrderPickedAndPacked;

    fn header(&self) -> &Header {
        &self.header
    }

    fn into_dead_letter(self) -> DeadLetterPayload {
        DeadLetterPayload::OrderPickedAndPacked(self)
    }
}

impl Event for Notification {
    const TOPIC: Topic = Topic::Notification;

    fn header(&self) -> &Header {
        &self.header
    }

    fn into_dead_letter(self) -> DeadLetterPayload {
        DeadLetterPayload::Notification(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Customer, Product};

    fn order() -> Order {
        Order::new(vec![Product::new("p-1", 1)], Customer::default())
    }

    #[test]
    fn test_order_event_wire_shape() {
        let event = OrderConfirmed {
            header: Header::new(),
            order: order(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["header"]["id"].is_string());
        assert_eq!(json["order"]["orderId"], event.order.order_id.as_str());
        assert_eq!(json["order"]["products"][0]["productId"], "p-1");
    }

    #[test]
    fn test_order_event_rejects_unknown_top_level_field() {
        let event = OrderReceived {
            header: Header::new(),
            order: order(),
        };
        let mut json = serde_json::to_value(&event).unwrap();
        json["priority"] = serde_json::json!("high");
        assert!(serde_json::from_value::<OrderReceived>(json).is_err());
    }

    #[test]
    fn test_notification_type_key() {
        let notification = Notification::new(
            Header::new(),
            NotificationContent {
                kind: NotificationKind::Email,
                recipient: "jane@example.com".to_string(),
                from: "orders@ppe4all".to_string(),
                subject: "s".to_string(),
                body: "b".to_string(),
            },
        );
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["type"], "email");
        assert_eq!(notification.content().recipient, "jane@example.com");
    }

    #[test]
    fn test_dead_letter_payload_is_adjacently_tagged() {
        let payload = DeadLetterPayload::raw(b"{not json");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Raw", "data": "{not json"}));
    }

    #[test]
    fn test_invalid_utf8_is_kept_as_base64() {
        let bytes = [0x66, 0xff, 0x6f];
        let payload = DeadLetterPayload::raw(&bytes);
        assert_eq!(payload, DeadLetterPayload::RawBase64("Zv9v".to_string()));
        assert_eq!(payload.kind(), "RawBase64");
        assert_eq!(payload.raw_bytes(), Some(bytes.to_vec()));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"type": "RawBase64", "data": "Zv9v"}));
    }

    #[test]
    fn test_raw_bytes_only_for_raw_variants() {
        assert_eq!(
            DeadLetterPayload::raw(b"{oops").raw_bytes(),
            Some(b"{oops".to_vec())
        );
        let typed = OrderConfirmed {
            header: Header::new(),
            order: order(),
        }
        .into_dead_letter();
        assert_eq!(typed.raw_bytes(), None);
    }

    #[test]
    fn test_into_dead_letter_keeps_typed_event() {
        let event = OrderPickedAndPacked {
            header: Header::new(),
            order: order(),
        };
        let payload = event.clone().into_dead_letter();
        assert_eq!(payload.kind(), "OrderPickedAndPacked");
        assert_eq!(payload, DeadLetterPayload::OrderPickedAndPacked(event));
    }

    #[test]
    fn test_event_topics() {
        assert_eq!(OrderReceived::TOPIC, Topic::OrderReceived);
        assert_eq!(OrderConfirmed::TOPIC, Topic::OrderConfirmed);
        assert_eq!(OrderPickedAndPacked::TOPIC, Topic::OrderPickedAndPacked);
        assert_eq!(Notification::TOPIC, Topic::Notification);
    }
}
