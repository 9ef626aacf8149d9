//! Outbound notification channels and in-memory implementations.

pub mod notification;

pub use notification::{
    LoggingChannel, Notification, NotificationChannel, NotificationError, Recipient,
    RecordingChannel,
};
