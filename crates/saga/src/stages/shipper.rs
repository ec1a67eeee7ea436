use async_trait::async_trait;
use domain::OrderPickedAndPacked;

use super::{DEFAULT_FROM, email_to_customer};
use crate::error::Result;
use crate::publisher::{Outbound, OutboundMessage};
use crate::stage::Stage;

const BODY: &str = "<p>We have finished packing your order. It's on its way!</p>";

/// Ships packed orders and tells the customer. Terminal for the order itself.
#[derive(Debug, Clone)]
pub struct ShipperStage {
    from: String,
}

impl ShipperStage {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl Default for ShipperStage {
    fn default() -> Self {
        Self::new(DEFAULT_FROM)
    }
}

#[async_trait]
impl Stage for ShipperStage {
    type Input = OrderPickedAndPacked;

    fn name(&self) -> &'static str {
        "shipper"
    }

    async fn handle(&self, input: &OrderPickedAndPacked) -> Result<Vec<Outbound>> {
        let order = &input.order;
        let subject = format!(
            "Hi {}, your order is being shipped",
            order.customer.full_name()
        );

        tracing::info!(order_id = %order.order_id, "order shipped");
        Ok(vec![
            OutboundMessage::Notification(email_to_customer(order, &self.from, subject, BODY))
                .into(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::fixtures::jane_doe_order;
    use common::{Header, Topic};

    #[tokio::test]
    async fn test_shipped_template() {
        let input = OrderPickedAndPacked {
            header: Header::new(),
            order: jane_doe_order(),
        };

        let out = ShipperStage::default().handle(&input).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].topic, Topic::Notification);

        let content = out[0].notification().unwrap();
        assert_eq!(content.recipient, "jane@example.com");
        assert_eq!(content.subject, "Hi Jane Doe, your order is being shipped");
        assert_eq!(
            content.body,
            "<p>We have finished packing your order. It's on its way!</p>"
        );
    }
}
