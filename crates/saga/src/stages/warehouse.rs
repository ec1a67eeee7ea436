use async_trait::async_trait;
use domain::OrderConfirmed;

use super::{DEFAULT_FROM, email_to_customer};
use crate::error::Result;
use crate::publisher::{Outbound, OutboundMessage};
use crate::stage::Stage;

const BODY: &str = "<p>We have received your order and it is being fulfilled!</p>";

/// Picks and packs confirmed orders and tells the customer.
///
/// Emits the confirmation notification first, then `OrderPickedAndPacked`
/// with the order unchanged.
#[derive(Debug, Clone)]
pub struct WarehouseStage {
    from: String,
}

impl WarehouseStage {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl Default for WarehouseStage {
    fn default() -> Self {
        Self::new(DEFAULT_FROM)
    }
}

#[async_trait]
impl Stage for WarehouseStage {
    type Input = OrderConfirmed;

    fn name(&self) -> &'static str {
        "warehouse"
    }

    async fn handle(&self, input: &OrderConfirmed) -> Result<Vec<Outbound>> {
        let order = &input.order;
        let subject = format!(
            "Hi {}, your order has been confirmed",
            order.customer.full_name()
        );

        tracing::info!(order_id = %order.order_id, "order picked and packed");
        Ok(vec![
            OutboundMessage::Notification(email_to_customer(order, &self.from, subject, BODY))
                .into(),
            OutboundMessage::OrderPickedAndPacked(order.clone()).into(),
        ])
    }
}
