//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::ValidationError;
use fulfillment::{ErrorKind, FulfillmentError};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed path, header or body.
    BadRequest(String),
    /// No caller identity was supplied.
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Fulfillment(FulfillmentError),
    /// Catalog writes that bypass the orchestrator.
    Store(StoreError),
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, ErrorKind::Forbidden.as_str()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Fulfillment(err) => {
                let kind = err.kind();
                (fulfillment_status(kind), kind.as_str())
            }
            ApiError::Store(StoreError::DuplicateCouponCode) => {
                (StatusCode::CONFLICT, "duplicate_coupon_code")
            }
            ApiError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::TransactionFailure.as_str(),
            ),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg) => msg.clone(),
            ApiError::Fulfillment(err) => err.to_string(),
            ApiError::Store(err) => err.to_string(),
        }
    }
}

fn fulfillment_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::ProductNotFound | ErrorKind::OrderNotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::InsufficientStock
        | ErrorKind::InvalidStateForCancellation
        | ErrorKind::InvalidTransition
        | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::ProductInactive => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::TransactionFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!(error = %message, kind, "internal server error");
        }

        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Fulfillment(err.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use common::ProductId;

    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_fulfillment_errors_map_to_status_codes() {
        assert_eq!(
            status_of(FulfillmentError::Validation(ValidationError::NoItems).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(FulfillmentError::ProductNotFound(ProductId::from("X")).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(FulfillmentError::ProductInactive(ProductId::from("X")).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(
                FulfillmentError::InsufficientStock {
                    product_id: ProductId::from("X"),
                    requested: 2,
                    available: 1,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(FulfillmentError::Conflict { attempts: 3 }.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(FulfillmentError::Forbidden("not yours".to_string()).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(StoreError::Unavailable("down".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_kind_matches_fulfillment_kind() {
        let err: ApiError = FulfillmentError::OrderNotFound("ORD-1".to_string()).into();
        assert_eq!(err.status_and_kind().1, "order_not_found");
        let err: ApiError = ValidationError::InvalidPercent(250).into();
        assert_eq!(
            err.status_and_kind(),
            (StatusCode::BAD_REQUEST, "validation_error")
        );
        assert_eq!(
            ApiError::Unauthorized("who".to_string()).status_and_kind(),
            (StatusCode::UNAUTHORIZED, "unauthorized")
        );
    }
}
