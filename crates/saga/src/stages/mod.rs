//! The four consuming stages of the fulfillment saga.

pub mod inventory;
pub mod notification;
pub mod shipper;
pub mod warehouse;

pub use inventory::InventoryStage;
pub use notification::{
    InMemoryNotificationSender, LogNotificationSender, NotificationSender, NotificationStage,
};
pub use shipper::ShipperStage;
pub use warehouse::WarehouseStage;

use domain::{NotificationContent, NotificationKind, Order};

/// Sender address used when none is configured.
pub const DEFAULT_FROM: &str = "orders@ppe4all";

/// Renders an email to the order's customer.
pub(crate) fn email_to_customer(
    order: &Order,
    from: &str,
    subject: String,
    body: &str,
) -> NotificationContent {
    NotificationContent {
        kind: NotificationKind::Email,
        recipient: order.customer.email.clone(),
        from: from.to_string(),
        subject,
        body: body.to_string(),
    }
}
