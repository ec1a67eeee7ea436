//! Domain layer for the order fulfillment saga.
//!
//! This crate provides:
//! - The [`Order`] value and its ingestion validation rules
//! - The events each stage consumes and emits, and the [`Event`] trait
//! - The dead-letter record ([`OrderError`]) and its payload union

pub mod events;
pub mod order;

pub use common::{EventId, Header, Topic};
pub use events::{
    DeadLetterPayload, Event, Notification, NotificationContent, NotificationKind,
    OrderConfirmed, OrderError, OrderPickedAndPacked, OrderReceived,
};
pub use order::{
    Customer, Order, Product, ProductId, ShippingAddress, ValidationErrors, is_valid_email,
};
