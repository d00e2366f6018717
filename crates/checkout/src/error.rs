//! Checkout error types.

use std::time::Duration;

use common::{OrderId, ProductId, UserId};
use domain::OrderError;
use order_store::OrderStoreError;
use thiserror::Error;

/// Errors reported by a collaborator (cart, payment, inventory).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The collaborator could not be reached or answered with a server error.
    #[error("{service} service unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },

    /// The call did not finish within its deadline.
    #[error("{service} service timed out after {after:?}")]
    Timeout {
        service: &'static str,
        after: Duration,
    },

    /// The payment gateway refused the charge.
    #[error("payment declined: {0}")]
    Declined(String),

    /// The product does not exist in the catalog.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The product has fewer units than requested.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i64,
    },

    /// The collaborator answered with something we could not interpret.
    #[error("invalid response from {service} service: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },
}

impl ServiceError {
    pub fn unavailable(service: &'static str, reason: impl ToString) -> Self {
        Self::Unavailable {
            service,
            reason: reason.to_string(),
        }
    }

    pub fn invalid_response(service: &'static str, reason: impl ToString) -> Self {
        Self::InvalidResponse {
            service,
            reason: reason.to_string(),
        }
    }

    /// Returns true if repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Errors that abort a checkout before the order is committed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user's cart has no lines.
    #[error("Cart is empty")]
    EmptyCart { user_id: UserId },

    /// The cart could not be read.
    #[error("Cart unavailable: {0}")]
    CartUnavailable(#[source] ServiceError),

    /// The cart holds lines that cannot become an order.
    #[error("Invalid cart: {0}")]
    InvalidCart(#[from] OrderError),

    /// A line asks for more units than the product has in stock.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Payment was declined, unreachable or timed out. Nothing was written.
    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    /// Payment was captured but the order could not be recorded.
    #[error("Order could not be recorded for payment {transaction_id}: {reason}")]
    OrderPersistence {
        transaction_id: String,
        refunded: bool,
        reason: String,
    },
}

impl CheckoutError {
    /// Short label used for the `reason` metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptyCart { .. } => "empty_cart",
            Self::CartUnavailable(_) => "cart_unavailable",
            Self::InvalidCart(_) => "invalid_cart",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::PaymentFailed(_) => "payment_failed",
            Self::OrderPersistence { .. } => "order_persistence",
        }
    }
}

/// A post-commit side effect that did not take effect.
///
/// These never fail the checkout; they end up in the fulfillment report and
/// the reconciliation log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FulfillmentError {
    #[error("Stock adjustment for product {product_id} failed: {source}")]
    StockAdjustment {
        product_id: ProductId,
        #[source]
        source: ServiceError,
    },

    #[error("Clearing cart of user {user_id} failed: {source}")]
    CartClear {
        user_id: UserId,
        #[source]
        source: ServiceError,
    },
}

impl FulfillmentError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StockAdjustment { .. } => "stock_adjustment",
            Self::CartClear { .. } => "cart_clear",
        }
    }
}

/// Errors on the read path.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Order not found")]
    OrderNotFound(OrderId),

    #[error("Order store error: {0}")]
    Store(#[from] OrderStoreError),
}
