//! Records of checkout inconsistencies that need offline follow-up.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::payment::PaymentResult;

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationKind {
    /// Payment was captured but the order could not be recorded.
    PaymentWithoutOrder,
    /// The order committed but a stock decrement never applied.
    StockAdjustmentFailed,
    /// The order committed but the cart was not cleared.
    CartClearFailed,
}

impl ReconciliationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationKind::PaymentWithoutOrder => "payment_without_order",
            ReconciliationKind::StockAdjustmentFailed => "stock_adjustment_failed",
            ReconciliationKind::CartClearFailed => "cart_clear_failed",
        }
    }
}

impl std::fmt::Display for ReconciliationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReconciliationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment_without_order" => Ok(ReconciliationKind::PaymentWithoutOrder),
            "stock_adjustment_failed" => Ok(ReconciliationKind::StockAdjustmentFailed),
            "cart_clear_failed" => Ok(ReconciliationKind::CartClearFailed),
            other => Err(format!("unknown reconciliation kind: {other}")),
        }
    }
}

/// A reconciliation record before the store assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReconciliation {
    pub kind: ReconciliationKind,
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub product_id: Option<ProductId>,
    pub transaction_id: Option<String>,
    pub amount: Option<Money>,
    /// True when a compensating refund already went through.
    pub refunded: bool,
    pub detail: String,
}

impl NewReconciliation {
    /// Payment captured, order insert failed.
    pub fn payment_without_order(
        user_id: UserId,
        payment: &PaymentResult,
        refunded: bool,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: ReconciliationKind::PaymentWithoutOrder,
            user_id,
            order_id: None,
            product_id: None,
            transaction_id: Some(payment.transaction_id.clone()),
            amount: Some(payment.amount),
            refunded,
            detail: detail.into(),
        }
    }

    pub fn stock_adjustment_failed(
        user_id: UserId,
        order_id: OrderId,
        product_id: ProductId,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: ReconciliationKind::StockAdjustmentFailed,
            user_id,
            order_id: Some(order_id),
            product_id: Some(product_id),
            transaction_id: None,
            amount: None,
            refunded: false,
            detail: detail.into(),
        }
    }

    pub fn cart_clear_failed(user_id: UserId, order_id: OrderId, detail: impl Into<String>) -> Self {
        Self {
            kind: ReconciliationKind::CartClearFailed,
            user_id,
            order_id: Some(order_id),
            product_id: None,
            transaction_id: None,
            amount: None,
            refunded: false,
            detail: detail.into(),
        }
    }
}

/// A stored reconciliation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub id: i64,
    #[serde(flatten)]
    pub record: NewReconciliation,
    pub recorded_at: DateTime<Utc>,
}
