//! Terminal stage: delivers notifications to customers.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{Notification, NotificationContent};
use tokio::sync::RwLock;

use crate::error::{Result, SagaError};
use crate::publisher::Outbound;
use crate::stage::Stage;

/// Delivery channel for rendered notifications.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Delivers one notification. An error dead-letters the inbound event.
    async fn send(&self, notification: &NotificationContent) -> std::result::Result<(), String>;
}

/// Sender that only logs what it would deliver.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSender;

#[async_trait]
impl NotificationSender for LogNotificationSender {
    async fn send(&self, notification: &NotificationContent) -> std::result::Result<(), String> {
        tracing::info!(
            kind = notification.kind.as_str(),
            from = %notification.from,
            recipient = %notification.recipient,
            subject = %notification.subject,
            "sending notification"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemorySenderState {
    sent: Vec<NotificationContent>,
    fail_on_send: bool,
}

/// Sender that records deliveries, for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationSender {
    state: Arc<RwLock<InMemorySenderState>>,
}

impl InMemoryNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sender to fail on subsequent sends.
    pub async fn set_fail_on_send(&self, fail: bool) {
        self.state.write().await.fail_on_send = fail;
    }

    /// Returns everything delivered so far, oldest first.
    pub async fn sent(&self) -> Vec<NotificationContent> {
        self.state.read().await.sent.clone()
    }
}

#[async_trait]
impl NotificationSender for InMemoryNotificationSender {
    async fn send(&self, notification: &NotificationContent) -> std::result::Result<(), String> {
        let mut state = self.state.write().await;
        if state.fail_on_send {
            return Err("mail relay unavailable".to_string());
        }
        state.sent.push(notification.clone());
        Ok(())
    }
}

/// Consumes notifications and hands them to a [`NotificationSender`].
///
/// Publishes nothing.
pub struct NotificationStage {
    sender: Arc<dyn NotificationSender>,
}

impl NotificationStage {
    pub fn new(sender: Arc<dyn NotificationSender>) -> Self {
        Self { sender }
    }
}

impl Default for NotificationStage {
    fn default() -> Self {
        Self::new(Arc::new(LogNotificationSender))
    }
}

#[async_trait]
impl Stage for NotificationStage {
    type Input = Notification;

    fn name(&self) -> &'static str {
        "notification"
    }

    async fn handle(&self, input: &Notification) -> Result<Vec<Outbound>> {
        self.sender
            .send(&input.content())
            .await
            .map_err(|reason| SagaError::StageFailed {
                stage: self.name().to_string(),
                reason,
            })?;
        Ok(Vec::new())
    }
}
