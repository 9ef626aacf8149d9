//! Domain layer for order fulfillment.
//!
//! This crate provides the pure parts of the subsystem:
//! - Money in integer minor units
//! - Coupon rules and discount computation
//! - The pricing calculator
//! - The order aggregate with its status and payment state machines
//! - Notification payloads raised by order operations

pub mod cart;
pub mod coupon;
pub mod error;
pub mod money;
pub mod order;
pub mod pricing;
pub mod product;

pub use cart::CartLine;
pub use coupon::{
    AppliedCoupon, Coupon, CouponOutcome, CouponStatus, CouponValidator, Discount, DiscountKind,
    InapplicableReason, normalize_code,
};
pub use error::{TransitionError, ValidationError};
pub use money::Money;
pub use order::{
    Address, Contact, LineRequest, MAX_ADMIN_NOTES_LEN, MAX_CUSTOMER_NOTES_LEN,
    MAX_LINE_QUANTITY, MAX_TRACKING_NUMBER_LEN, NewOrder, NewOrderAlertData, NotificationEvent,
    Order, OrderConfirmedData, OrderDraft, OrderLineItem, OrderNumber, OrderParts,
    OrderStatus, OrderStatusChangedData, PaymentMethod, PaymentStatus, ProductSnapshot,
    StatusTransition, StatusUpdate,
};
pub use pricing::{MAX_ORDER_SUBTOTAL, PriceBreakdown, PricingCalculator, PricingConfig};
pub use product::{MAX_UNIT_PRICE, Product};
