//! Cart snapshots read at the start of checkout.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// A single line in a user's cart, priced at the time the cart was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub image_url: Option<String>,
}

impl CartLine {
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            unit_price,
            quantity,
            image_url: None,
        }
    }

    /// Returns `unit_price * quantity`, or `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

/// Read-only view of a cart.
///
/// Lines keep the order the cart service returned them in (insertion order
/// of cart additions). The total is always computed from the lines and is
/// `None` when it does not fit in [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    lines: Vec<CartLine>,
    total: Option<Money>,
}

impl Default for CartSnapshot {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            total: Some(Money::zero()),
        }
    }
}

impl CartSnapshot {
    /// Creates a snapshot and computes its total.
    pub fn new(lines: Vec<CartLine>) -> Self {
        let total = lines
            .iter()
            .try_fold(Money::zero(), |total, line| total.checked_add(line.line_total()?));
        Self { lines, total }
    }

    /// Returns an empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn total(&self) -> Option<Money> {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}
