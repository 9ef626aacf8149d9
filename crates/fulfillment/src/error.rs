//! Fulfillment error types.

use common::ProductId;
use domain::{OrderNumber, OrderStatus, TransitionError, ValidationError};
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by fulfillment operations.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Malformed input, rejected before any transaction started.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Product is not available for purchase: {0}")]
    ProductInactive(ProductId),

    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The actor may not perform this operation on the order.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Order {order_number} cannot be cancelled while {status}")]
    InvalidStateForCancellation {
        order_number: OrderNumber,
        status: OrderStatus,
    },

    #[error("Invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    /// Concurrent transactions kept winning until the retry budget ran out.
    #[error("Concurrent update conflict persisted after {attempts} attempts")]
    Conflict { attempts: u32 },

    /// Storage failed; nothing from the transaction was kept.
    #[error("Transaction failed: {0}")]
    TransactionFailure(#[from] StoreError),
}

impl FulfillmentError {
    /// Returns the stable kind the error is reported under.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FulfillmentError::Validation(_) => ErrorKind::Validation,
            FulfillmentError::ProductNotFound(_) => ErrorKind::ProductNotFound,
            FulfillmentError::ProductInactive(_) => ErrorKind::ProductInactive,
            FulfillmentError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            FulfillmentError::OrderNotFound(_) => ErrorKind::OrderNotFound,
            FulfillmentError::Forbidden(_) => ErrorKind::Forbidden,
            FulfillmentError::InvalidStateForCancellation { .. } => {
                ErrorKind::InvalidStateForCancellation
            }
            FulfillmentError::InvalidTransition(_) => ErrorKind::InvalidTransition,
            FulfillmentError::Conflict { .. } => ErrorKind::Conflict,
            FulfillmentError::TransactionFailure(_) => ErrorKind::TransactionFailure,
        }
    }

    /// Returns true for store errors a fresh transaction may get past.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FulfillmentError::TransactionFailure(e) if e.is_retryable())
    }
}

/// Stable, machine-readable error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    ProductNotFound,
    ProductInactive,
    InsufficientStock,
    OrderNotFound,
    Forbidden,
    InvalidStateForCancellation,
    InvalidTransition,
    Conflict,
    TransactionFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::ProductNotFound => "product_not_found",
            ErrorKind::ProductInactive => "product_inactive",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::OrderNotFound => "order_not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidStateForCancellation => "invalid_state_for_cancellation",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TransactionFailure => "transaction_failure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_store_conflicts_are_retryable() {
        let conflict = FulfillmentError::from(StoreError::Conflict("lost".to_string()));
        assert!(conflict.is_retryable());
        assert_eq!(conflict.kind(), ErrorKind::TransactionFailure);

        let duplicate = FulfillmentError::from(StoreError::DuplicateOrderNumber);
        assert!(duplicate.is_retryable());

        let down = FulfillmentError::from(StoreError::Unavailable("down".to_string()));
        assert!(!down.is_retryable());
        assert!(!FulfillmentError::Conflict { attempts: 3 }.is_retryable());
    }

    #[test]
    fn test_kind_strings() {
        let err = FulfillmentError::InsufficientStock {
            product_id: ProductId::from("P"),
            requested: 6,
            available: 5,
        };
        assert_eq!(err.kind().as_str(), "insufficient_stock");
        assert_eq!(
            FulfillmentError::from(ValidationError::NoItems).kind().to_string(),
            "validation_error"
        );
    }
}
