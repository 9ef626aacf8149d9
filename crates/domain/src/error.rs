//! Domain error types.

use common::ProductId;
use thiserror::Error;

use crate::Money;
use crate::order::{OrderStatus, PaymentStatus};

/// Malformed input, rejected before any transaction starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Order must contain at least one item")]
    NoItems,

    #[error("Invalid quantity {quantity} for product {product_id} (must be between 1 and {max})")]
    InvalidQuantity {
        product_id: ProductId,
        quantity: u32,
        max: u32,
    },

    #[error("{address} address is missing required field '{field}'")]
    MissingAddressField {
        address: &'static str,
        field: &'static str,
    },

    #[error("Invalid contact email: {0:?}")]
    InvalidEmail(String),

    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Tracking number must not be blank")]
    BlankTrackingNumber,

    #[error("A cancellation cannot also set the payment status")]
    CancellationWithPaymentStatus,

    #[error("Invalid order number: {0:?}")]
    InvalidOrderNumber(String),

    #[error("{0} must not be blank")]
    MissingField(&'static str),

    #[error("{field} must not be negative")]
    NegativeAmount { field: &'static str },

    #[error("{field} exceeds the maximum of {max}")]
    AmountTooLarge { field: &'static str, max: Money },

    #[error("Percentage discount must be between 1 and 100, got {0}")]
    InvalidPercent(u32),

    #[error("Usage limit {limit} is below the {used} uses already redeemed")]
    UsageLimitBelowUsed { limit: u32, used: u32 },

    #[error("Coupon validity window ends before it starts")]
    InvertedValidityWindow,
}

/// A status or payment-status change the order lifecycle does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatus { from: OrderStatus, to: OrderStatus },

    #[error("Invalid payment status transition from {from} to {to}")]
    InvalidPayment {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Order in {status} state cannot be cancelled")]
    NotCancellable { status: OrderStatus },
}
