//! Orders as committed to and read from the order store.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderStatus, PaymentMethod, ShippingAddress};
use crate::cart::CartSnapshot;

/// A committed order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    /// Transaction id issued by the payment gateway.
    pub payment_reference: String,
    pub created_at: DateTime<Utc>,
}

/// A committed order line. The price is the purchase-time value and is never
/// recomputed from the current product price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    /// Returns `unit_price * quantity`, or `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

/// An order line with product fields joined in at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineDetails {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(rename = "price")]
    pub unit_price: Money,
    /// `None` when the product row no longer exists.
    pub name: Option<String>,
    pub image_url: Option<String>,
}

/// An order with its lines, as returned by the read path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLineDetails>,
}

/// A line of an order that has not been committed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl NewOrderLine {
    /// Returns `unit_price * quantity`, or `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

/// An order ready to be inserted atomically with its lines.
///
/// Construct through [`NewOrder::from_cart`], which enforces the checkout
/// invariants: at least one line, positive quantities, non-negative prices,
/// and a total equal to the sum of the line totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total_amount: Money,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_reference: String,
    pub lines: Vec<NewOrderLine>,
}

impl NewOrder {
    /// Builds an order from a cart snapshot, locking in the snapshot prices.
    pub fn from_cart(
        user_id: UserId,
        cart: &CartSnapshot,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        payment_reference: impl Into<String>,
    ) -> Result<Self, OrderError> {
        let lines = cart
            .lines()
            .iter()
            .map(|line| NewOrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        let order = Self {
            user_id,
            total_amount: cart.total().ok_or(OrderError::AmountOverflow)?,
            shipping_address,
            payment_method,
            payment_reference: payment_reference.into(),
            lines,
        };
        order.validate()?;
        Ok(order)
    }

    /// Checks the invariants stores rely on before writing.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.lines.is_empty() {
            return Err(OrderError::NoLines);
        }
        for line in &self.lines {
            if line.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: line.product_id,
                    quantity: line.quantity,
                });
            }
            if line.unit_price.is_negative() {
                return Err(OrderError::InvalidPrice {
                    product_id: line.product_id,
                    price: line.unit_price.cents(),
                });
            }
        }

        let lines_total = self
            .lines
            .iter()
            .try_fold(Money::zero(), |total, line| total.checked_add(line.line_total()?))
            .ok_or(OrderError::AmountOverflow)?;
        if lines_total != self.total_amount {
            return Err(OrderError::TotalMismatch {
                expected: self.total_amount,
                actual: lines_total,
            });
        }
        Ok(())
    }

    /// Materializes the committed header once the store assigned an id.
    pub fn into_order(self, id: OrderId, created_at: DateTime<Utc>) -> (Order, Vec<OrderLine>) {
        let lines = self
            .lines
            .into_iter()
            .map(|line| OrderLine {
                order_id: id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();
        let order = Order {
            id,
            user_id: self.user_id,
            total_amount: self.total_amount,
            status: OrderStatus::Processing,
            shipping_address: self.shipping_address,
            payment_method: self.payment_method,
            payment_reference: self.payment_reference,
            created_at,
        };
        (order, lines)
    }
}
