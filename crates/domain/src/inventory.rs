//! Stock levels reported by the inventory collaborator.

use common::ProductId;
use serde::{Deserialize, Serialize};

/// Product stock as returned after a decrement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: ProductId,
    pub name: Option<String>,
    pub stock: i64,
}

/// A request to take `quantity` units of a product out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl StockAdjustment {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}
