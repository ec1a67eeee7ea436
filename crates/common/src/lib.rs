//! Shared identity and routing types for the fulfillment services.

pub mod topic;
pub mod types;

pub use topic::{Topic, UnknownTopic};
pub use types::{EventId, Header};
