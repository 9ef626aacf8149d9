//! Order aggregate and related types.

mod address;
mod aggregate;
mod commands;
mod events;
mod line_item;
mod number;
mod state;

pub use address::{Address, Contact, PaymentMethod};
pub use aggregate::{Order, OrderDraft, OrderParts, StatusTransition};
pub use commands::{
    LineRequest, MAX_ADMIN_NOTES_LEN, MAX_CUSTOMER_NOTES_LEN, MAX_LINE_QUANTITY,
    MAX_TRACKING_NUMBER_LEN, NewOrder, StatusUpdate,
};
pub use events::{
    NewOrderAlertData, NotificationEvent, OrderConfirmedData, OrderStatusChangedData,
};
pub use line_item::{OrderLineItem, ProductSnapshot};
pub use number::OrderNumber;
pub use state::{OrderStatus, PaymentStatus};
