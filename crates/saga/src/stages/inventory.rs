use async_trait::async_trait;
use domain::OrderReceived;

use crate::error::Result;
use crate::publisher::{Outbound, OutboundMessage};
use crate::stage::Stage;

/// Confirms every received order, forwarding it unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryStage;

#[async_trait]
impl Stage for InventoryStage {
    type Input = OrderReceived;

    fn name(&self) -> &'static str {
        "inventory"
    }

    async fn handle(&self, input: &OrderReceived) -> Result<Vec<Outbound>> {
        tracing::info!(order_id = %input.order.order_id, "order confirmed");
        Ok(vec![
            OutboundMessage::OrderConfirmed(input.order.clone()).into(),
        ])
    }
}
