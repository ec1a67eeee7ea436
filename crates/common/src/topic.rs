use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed set of bus topics the fulfillment saga uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    OrderReceived,
    OrderConfirmed,
    OrderPickedAndPacked,
    Notification,
    DeadLetterQueue,
}

impl Topic {
    /// Every topic, in saga order with the dead-letter queue last.
    pub const ALL: [Topic; 5] = [
        Topic::OrderReceived,
        Topic::OrderConfirmed,
        Topic::OrderPickedAndPacked,
        Topic::Notification,
        Topic::DeadLetterQueue,
    ];

    /// Returns the topic name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::OrderReceived => "OrderReceived",
            Topic::OrderConfirmed => "OrderConfirmed",
            Topic::OrderPickedAndPacked => "OrderPickedAndPacked",
            Topic::Notification => "Notification",
            Topic::DeadLetterQueue => "DeadLetterQueue",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when parsing a name that is not one of the fixed topics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl std::str::FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}
