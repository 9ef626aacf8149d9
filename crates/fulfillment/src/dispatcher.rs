//! Fire-and-forget delivery of notification events.
//!
//! Publishers push onto a bounded in-process queue and return immediately.
//! A single worker task drains the queue and hands each event to every
//! channel concurrently. Each channel gets a timeout and one retry; failures
//! are logged and counted, never reported back to the publisher.

use std::sync::Arc;
use std::time::Duration;

use domain::NotificationEvent;
use futures_util::future::join_all;
use tokio::sync::{mpsc, oneshot};

use crate::services::{Notification, NotificationChannel, Recipient};

/// Attempts per channel and event.
const DELIVERY_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub queue_capacity: usize,
    /// Upper bound for a single delivery attempt.
    pub delivery_timeout: Duration,
    /// Pause before the retry.
    pub retry_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            delivery_timeout: Duration::from_secs(5),
            retry_delay: Duration::from_millis(200),
        }
    }
}

enum Command {
    Deliver(Notification),
    Flush(oneshot::Sender<()>),
}

/// Handle to the notification worker. Cheap to clone.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<Command>,
}

impl NotificationDispatcher {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(channels: Vec<Arc<dyn NotificationChannel>>, config: DispatcherConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        tokio::spawn(run_worker(receiver, channels, config));
        Self { sender }
    }

    /// Queues an event without waiting. A full or closed queue drops the
    /// event with a warning.
    pub fn publish(&self, recipient: Recipient, event: NotificationEvent) {
        let event_type = event.event_type();
        let command = Command::Deliver(Notification { recipient, event });

        match self.sender.try_send(command) {
            Ok(()) => {
                metrics::counter!("notifications_queued_total").increment(1);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::counter!("notifications_dropped_total").increment(1);
                tracing::warn!(event_type, "notification queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                metrics::counter!("notifications_dropped_total").increment(1);
                tracing::warn!(event_type, "notification worker stopped, dropping event");
            }
        }
    }

    /// Waits until everything published before this call has been handled.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(Command::Flush(ack)).await.is_ok() {
            let _ = done.await;
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<Command>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    config: DispatcherConfig,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Deliver(notification) => {
                join_all(
                    channels
                        .iter()
                        .map(|channel| deliver(channel.as_ref(), &notification, &config)),
                )
                .await;
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!("notification worker stopped");
}

#[tracing::instrument(
    skip_all,
    fields(
        channel = channel.name(),
        event_type = notification.event.event_type(),
        order_number = %notification.event.order_number(),
    )
)]
async fn deliver(
    channel: &dyn NotificationChannel,
    notification: &Notification,
    config: &DispatcherConfig,
) {
    let name = channel.name();

    for attempt in 1..=DELIVERY_ATTEMPTS {
        let outcome = tokio::time::timeout(
            config.delivery_timeout,
            channel.deliver(&notification.recipient, &notification.event),
        )
        .await;

        match outcome {
            Ok(Ok(())) => {
                metrics::counter!("notifications_sent_total", "channel" => name).increment(1);
                return;
            }
            Ok(Err(err)) => {
                tracing::warn!(attempt, error = %err, "notification delivery failed");
            }
            Err(_) => {
                tracing::warn!(
                    attempt,
                    timeout_ms = config.delivery_timeout.as_millis() as u64,
                    "notification delivery timed out"
                );
            }
        }

        if attempt < DELIVERY_ATTEMPTS {
            tokio::time::sleep(config.retry_delay).await;
        }
    }

    metrics::counter!("notifications_failed_total", "channel" => name).increment(1);
}

#[cfg(test)]
mod tests {
    use common::OrderId;
    use domain::{Money, NewOrderAlertData, OrderNumber};

    use super::*;
    use crate::services::RecordingChannel;

    fn alert() -> NotificationEvent {
        NotificationEvent::NewOrderAlert(NewOrderAlertData {
            order_id: OrderId::new(),
            order_number: OrderNumber::parse("ORD-00000001-ZZ99").unwrap(),
            customer_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            item_count: 1,
            total: Money::from_cents(1000),
        })
    }

    fn fast_config() -> DispatcherConfig {
        DispatcherConfig {
            queue_capacity: 16,
            delivery_timeout: Duration::from_millis(50),
            retry_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_delivers_to_every_channel() {
        let email = RecordingChannel::email();
        let push = RecordingChannel::push();
        let dispatcher = NotificationDispatcher::spawn(
            vec![Arc::new(email.clone()), Arc::new(push.clone())],
            fast_config(),
        );

        dispatcher.publish(Recipient::Admins, alert());
        dispatcher.flush().await;

        assert_eq!(email.delivered().await.len(), 1);
        assert_eq!(push.delivered().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_channel_is_isolated_and_retried_once() {
        let email = RecordingChannel::email();
        let sms = RecordingChannel::sms();
        email.set_fail_on_deliver(true).await;

        let dispatcher = NotificationDispatcher::spawn(
            vec![Arc::new(email.clone()), Arc::new(sms.clone())],
            fast_config(),
        );

        dispatcher.publish(Recipient::Admins, alert());
        dispatcher.flush().await;

        assert_eq!(email.attempts().await, 2);
        assert!(email.delivered().await.is_empty());
        assert_eq!(sms.delivered().await.len(), 1);
    }

    #[tokio::test]
    async fn test_slow_channel_times_out() {
        let slow = RecordingChannel::push();
        slow.set_delay(Some(Duration::from_secs(10))).await;

        let dispatcher = NotificationDispatcher::spawn(vec![Arc::new(slow.clone())], fast_config());

        dispatcher.publish(Recipient::Admins, alert());
        dispatcher.flush().await;

        assert_eq!(slow.attempts().await, 2);
        assert!(slow.delivered().await.is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let slow = RecordingChannel::email();
        slow.set_delay(Some(Duration::from_millis(20))).await;
        let config = DispatcherConfig {
            queue_capacity: 1,
            ..fast_config()
        };
        let dispatcher = NotificationDispatcher::spawn(vec![Arc::new(slow.clone())], config);

        for _ in 0..10 {
            dispatcher.publish(Recipient::Admins, alert());
        }
        dispatcher.flush().await;

        let delivered = slow.delivered().await.len();
        assert!(delivered >= 1);
        assert!(delivered < 10);
    }
}
