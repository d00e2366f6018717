//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, QueryError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout aborted before the order was committed.
    Checkout(CheckoutError),
    /// Read path error.
    Query(QueryError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Query(err) => query_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    let status = match &err {
        CheckoutError::EmptyCart { .. } | CheckoutError::InvalidCart(_) => StatusCode::BAD_REQUEST,
        CheckoutError::InsufficientStock { .. } => StatusCode::CONFLICT,
        CheckoutError::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
        CheckoutError::CartUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CheckoutError::OrderPersistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn query_error_to_response(err: QueryError) -> (StatusCode, String) {
    match &err {
        QueryError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        QueryError::Store(store_err) => {
            tracing::error!(error = %store_err, "order store error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch orders".to_string())
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::Query(err)
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderId, ProductId, UserId};

    use super::*;

    fn status(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_checkout_errors_map_to_documented_statuses() {
        assert_eq!(
            status(CheckoutError::EmptyCart { user_id: UserId::new(1) }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(
                CheckoutError::InsufficientStock {
                    product_id: ProductId::new(1),
                    requested: 2,
                    available: 1,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(CheckoutError::PaymentFailed("declined".to_string()).into()),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status(
                CheckoutError::CartUnavailable(checkout::ServiceError::unavailable("cart", "down"))
                    .into()
            ),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(
                CheckoutError::OrderPersistence {
                    transaction_id: "TXN-1".to_string(),
                    refunded: true,
                    reason: "db down".to_string(),
                }
                .into()
            ),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_order_is_404() {
        assert_eq!(
            status(QueryError::OrderNotFound(OrderId::new(3)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status(ApiError::BadRequest("bad".into())), StatusCode::BAD_REQUEST);
    }
}
