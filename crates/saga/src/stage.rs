//! The per-service transformation driven by the consumer loop.

use async_trait::async_trait;
use domain::Event;

use crate::error::Result;
use crate::publisher::Outbound;

/// One hop of the saga: an inbound event in, zero or more outbound events out.
///
/// Output must depend only on the input so a stage can be exercised without
/// a bus. Headers are not part of the output; the publisher mints them.
#[async_trait]
pub trait Stage: Send + Sync {
    /// The event type this stage consumes. Its topic is the subscription.
    type Input: Event;

    /// Service name, used in logs and dead-letter reasons.
    fn name(&self) -> &'static str;

    async fn handle(&self, input: &Self::Input) -> Result<Vec<Outbound>>;
}
