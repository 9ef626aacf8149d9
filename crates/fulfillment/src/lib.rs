//! Order fulfillment orchestration.
//!
//! [`FulfillmentService`] is the entry point. It turns a cart into an order
//! inside one store transaction:
//! 1. Look up every product and reserve its stock
//! 2. Validate the coupon against the subtotal
//! 3. Price the order and persist it
//! 4. Redeem the coupon and clear the cart
//!
//! Cancellation reverses the stock and coupon effects in its own
//! transaction. Notifications are dispatched after commit and never fail
//! the operation that raised them.

pub mod authorization;
pub mod dispatcher;
pub mod error;
pub mod retry;
pub mod service;
pub mod services;

pub use authorization::{Actor, CancelAuthorization, Permission, Role, authorize_cancellation};
pub use dispatcher::{DispatcherConfig, NotificationDispatcher};
pub use error::{ErrorKind, FulfillmentError, Result};
pub use retry::RetryPolicy;
pub use service::{FulfillmentService, StatusUpdateOutcome};
pub use services::{
    LoggingChannel, Notification, NotificationChannel, NotificationError, Recipient,
    RecordingChannel,
};
