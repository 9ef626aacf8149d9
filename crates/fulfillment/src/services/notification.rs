//! Notification channel trait and in-memory implementations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::UserId;
use domain::{NotificationEvent, Order};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors a channel reports for one delivery attempt.
#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("{channel} delivery failed: {reason}")]
    Delivery {
        channel: &'static str,
        reason: String,
    },
}

/// Who an event is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recipient {
    Customer {
        user_id: UserId,
        email: String,
        phone: Option<String>,
    },
    /// The store's administrators.
    Admins,
}

impl Recipient {
    /// The customer who placed `order`.
    pub fn customer_of(order: &Order) -> Self {
        let contact = order.contact();
        Recipient::Customer {
            user_id: order.user_id(),
            email: contact.email.clone(),
            phone: contact
                .phone
                .clone()
                .or_else(|| order.shipping_address().phone.clone()),
        }
    }
}

/// An event together with its recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: Recipient,
    pub event: NotificationEvent,
}

/// A delivery provider such as email, SMS or push.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Stable channel name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn deliver(
        &self,
        recipient: &Recipient,
        event: &NotificationEvent,
    ) -> Result<(), NotificationError>;
}

/// Channel that writes each delivery to the log. Used when no provider is
/// configured.
#[derive(Debug, Clone, Copy)]
pub struct LoggingChannel {
    name: &'static str,
}

impl LoggingChannel {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl NotificationChannel for LoggingChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn deliver(
        &self,
        recipient: &Recipient,
        event: &NotificationEvent,
    ) -> Result<(), NotificationError> {
        let recipient = match recipient {
            Recipient::Customer { email, .. } => email.as_str(),
            Recipient::Admins => "admins",
        };
        tracing::info!(
            channel = self.name,
            recipient,
            event_type = event.event_type(),
            order_number = %event.order_number(),
            "notification delivered"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    delivered: Vec<Notification>,
    attempts: usize,
    fail_on_deliver: bool,
    delay: Option<Duration>,
}

/// In-memory channel for testing. Records every successful delivery.
#[derive(Debug, Clone)]
pub struct RecordingChannel {
    name: &'static str,
    state: Arc<RwLock<RecordingState>>,
}

impl RecordingChannel {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::default(),
        }
    }

    pub fn email() -> Self {
        Self::new("email")
    }

    pub fn sms() -> Self {
        Self::new("sms")
    }

    pub fn push() -> Self {
        Self::new("push")
    }

    /// Configures the channel to fail every delivery.
    pub async fn set_fail_on_deliver(&self, fail: bool) {
        self.state.write().await.fail_on_deliver = fail;
    }

    /// Makes every delivery take `delay` before completing.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().await.delay = delay;
    }

    /// Returns the successfully delivered notifications.
    pub async fn delivered(&self) -> Vec<Notification> {
        self.state.read().await.delivered.clone()
    }

    /// Returns how many deliveries were attempted, successful or not.
    pub async fn attempts(&self) -> usize {
        self.state.read().await.attempts
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn deliver(
        &self,
        recipient: &Recipient,
        event: &NotificationEvent,
    ) -> Result<(), NotificationError> {
        let delay = {
            let mut state = self.state.write().await;
            state.attempts += 1;
            if state.fail_on_deliver {
                return Err(NotificationError::Delivery {
                    channel: self.name,
                    reason: "provider rejected the message".to_string(),
                });
            }
            state.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.state.write().await.delivered.push(Notification {
            recipient: recipient.clone(),
            event: event.clone(),
        });
        Ok(())
    }
}
