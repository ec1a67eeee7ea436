//! Wire-format tests for the events exchanged between services.
//!
//! These decode literal JSON the way a consumer receives it from the bus.

use domain::{
    DeadLetterPayload, Event, EventId, Notification, NotificationKind, OrderError, OrderReceived,
    Topic,
};

const ORDER_RECEIVED: &str = r#"{
    "header": {"id": "5b1d7c7e-6f7e-4a59-9d4b-0b8e6f3c2a11", "publishedAt": "2024-05-01T12:00:00Z"},
    "order": {
        "orderId": "0f5c2d3e-1111-4a2b-8c9d-222233334444",
        "products": [{"productId": "8a7b6c5d-4e3f-4a1b-9c8d-7e6f5a4b3c2d", "quantity": 2}],
        "customer": {
            "firstName": "Jane",
            "lastName": "Doe",
            "emailAddress": "jane@example.com",
            "shippingAddress": {"street": "1 Main St", "city": "X", "state": "Y", "postalCode": "00000"}
        }
    }
}"#;

#[test]
fn decodes_order_received_from_wire() {
    let event: OrderReceived = serde_json::from_str(ORDER_RECEIVED).unwrap();

    assert_eq!(
        event.header().id,
        EventId::from("5b1d7c7e-6f7e-4a59-9d4b-0b8e6f3c2a11")
    );
    assert_eq!(event.order.products.len(), 1);
    assert_eq!(event.order.products[0].quantity, 2);
    assert_eq!(event.order.customer.email, "jane@example.com");
    assert_eq!(event.order.customer.shipping_address.postal_code, "00000");
    assert!(event.order.validate().is_ok());
}

#[test]
fn rejects_schema_drift_anywhere_in_the_payload() {
    let drifted = ORDER_RECEIVED.replace(r#""quantity": 2"#, r#""quantity": 2, "sku": "X""#);
    assert!(serde_json::from_str::<OrderReceived>(&drifted).is_err());

    let drifted = ORDER_RECEIVED.replace(
        r#""publishedAt": "2024-05-01T12:00:00Z""#,
        r#""publishedAt": "2024-05-01T12:00:00Z", "source": "web""#,
    );
    assert!(serde_json::from_str::<OrderReceived>(&drifted).is_err());
}

#[test]
fn rejects_missing_fields() {
    let missing = ORDER_RECEIVED.replace(r#""lastName": "Doe","#, "");
    assert!(serde_json::from_str::<OrderReceived>(&missing).is_err());
}

#[test]
fn notification_does_not_decode_as_order_event() {
    let json = r#"{
        "header": {"id": "n-1", "publishedAt": "2024-05-01T12:00:00Z"},
        "type": "email",
        "recipient": "jane@example.com",
        "from": "orders@ppe4all",
        "subject": "Hi Jane Doe, your order has been confirmed",
        "body": "<p>We have received your order and it is being fulfilled!</p>"
    }"#;

    let notification: Notification = serde_json::from_str(json).unwrap();
    assert_eq!(notification.kind, NotificationKind::Email);
    assert!(serde_json::from_str::<OrderReceived>(json).is_err());
}

#[test]
fn dead_letter_record_keeps_typed_original() {
    let event: OrderReceived = serde_json::from_str(ORDER_RECEIVED).unwrap();
    let record = OrderError {
        header: domain::Header::new(),
        source_topic: Topic::OrderReceived,
        reason: "Ledger unavailable".to_string(),
        event: event.clone().into_dead_letter(),
    };

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["sourceTopic"], "OrderReceived");
    assert_eq!(json["event"]["type"], "OrderReceived");
    assert_eq!(
        json["event"]["data"]["order"]["orderId"],
        "0f5c2d3e-1111-4a2b-8c9d-222233334444"
    );

    let decoded: OrderError = serde_json::from_value(json).unwrap();
    assert_eq!(decoded.event, DeadLetterPayload::OrderReceived(event));
}
