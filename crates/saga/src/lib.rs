//! Idempotent event consumption and forwarding for the order fulfillment saga.
//!
//! Each service runs one [`EventConsumer`] around one [`Stage`]:
//!
//! 1. Poll the stage's input topic
//! 2. Decode strictly; undecodable bytes go to the dead-letter queue
//! 3. Skip event ids already in the [`ledger::DedupLedger`], otherwise record them
//! 4. Run the stage and publish each outbound event with a fresh header
//!
//! The saga itself is choreographed: stages only know their own input and
//! outputs, and [`Topology::standard`] describes how they chain.

pub mod consumer;
pub mod dead_letter;
pub mod error;
pub mod publisher;
pub mod stage;
pub mod stages;
pub mod topology;

pub use consumer::{
    ConsumerConfig, DEFAULT_POLL_ERROR_BACKOFF, DEFAULT_POLL_TIMEOUT, EventConsumer, Outcome,
};
pub use dead_letter::DeadLetterRouter;
pub use error::{Result, SagaError};
pub use publisher::{Outbound, OutboundMessage, Publisher};
pub use stage::Stage;
pub use stages::{
    DEFAULT_FROM, InMemoryNotificationSender, InventoryStage, LogNotificationSender,
    NotificationSender, NotificationStage, ShipperStage, WarehouseStage,
};
pub use topology::{StageSpec, Topology};
