//! The fixed graph of stages that makes up the fulfillment saga.

use common::Topic;

/// One node of the saga graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub name: &'static str,
    /// `None` for ingestion, which is driven by HTTP rather than the bus.
    pub input: Option<Topic>,
    /// Topics published, in emission order.
    pub outputs: &'static [Topic],
}

/// The ordered list of stages from ingestion to delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    stages: Vec<StageSpec>,
}

impl Topology {
    /// The order-fulfillment saga:
    /// ingestion → inventory → warehouse → shipper → notification.
    pub fn standard() -> Self {
        Self {
            stages: vec![
                StageSpec {
                    name: "order-service",
                    input: None,
                    outputs: &[Topic::OrderReceived],
                },
                StageSpec {
                    name: "inventory",
                    input: Some(Topic::OrderReceived),
                    outputs: &[Topic::OrderConfirmed],
                },
                StageSpec {
                    name: "warehouse",
                    input: Some(Topic::OrderConfirmed),
                    outputs: &[Topic::Notification, Topic::OrderPickedAndPacked],
                },
                StageSpec {
                    name: "shipper",
                    input: Some(Topic::OrderPickedAndPacked),
                    outputs: &[Topic::Notification],
                },
                StageSpec {
                    name: "notification",
                    input: Some(Topic::Notification),
                    outputs: &[],
                },
            ],
        }
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Stages that subscribe to `topic`.
    pub fn consumers_of(&self, topic: Topic) -> impl Iterator<Item = &StageSpec> {
        self.stages.iter().filter(move |s| s.input == Some(topic))
    }
}
