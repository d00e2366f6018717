//! Orders, order lines and related value objects.

mod model;
mod state;
mod value_objects;

pub use model::{NewOrder, NewOrderLine, Order, OrderDetails, OrderLine, OrderLineDetails};
pub use state::OrderStatus;
pub use value_objects::{PaymentMethod, ShippingAddress};

use common::{Money, ProductId};
use thiserror::Error;

/// Errors raised when an order violates its invariants.
#[derive(Debug, Error)]
pub enum OrderError {
    /// An order must have at least one line.
    #[error("Order has no lines")]
    NoLines,

    /// Invalid quantity.
    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity {
        product_id: ProductId,
        quantity: u32,
    },

    /// Invalid price.
    #[error("Invalid price {price} for product {product_id} (must not be negative)")]
    InvalidPrice { product_id: ProductId, price: i64 },

    /// The header total disagrees with the line totals.
    #[error("Order total {expected} does not match line total {actual}")]
    TotalMismatch { expected: Money, actual: Money },

    /// A line total or the order total does not fit in a money amount.
    #[error("Order total is too large")]
    AmountOverflow,

    /// A stored status value is not recognised.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}
