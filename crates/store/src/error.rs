use thiserror::Error;

/// Errors that can occur when interacting with the fulfillment store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The transaction lost a race with a concurrent one (serialization
    /// failure, deadlock, or a conditional update that no longer holds).
    /// Retrying the whole transaction may succeed.
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    /// The generated order number is already taken.
    #[error("Order number already exists")]
    DuplicateOrderNumber,

    /// Another coupon already uses this code.
    #[error("Coupon code already exists")]
    DuplicateCouponCode,

    /// The store could not be reached or refused the commit.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back to a domain value.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if re-running the transaction from scratch may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_) | StoreError::DuplicateOrderNumber)
    }
}

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if let Some(code) = db_err.code()
                && (code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED)
            {
                return StoreError::Conflict(db_err.message().to_string());
            }
            match db_err.constraint() {
                Some("orders_order_number_key") => return StoreError::DuplicateOrderNumber,
                Some("coupons_code_key") => return StoreError::DuplicateCouponCode,
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
