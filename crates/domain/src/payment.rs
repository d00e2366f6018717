//! Payment gateway results.

use common::Money;
use serde::{Deserialize, Serialize};

use crate::order::PaymentMethod;

/// Outcome of a payment authorization.
///
/// Not persisted on its own; the transaction id is copied into the order's
/// payment reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub success: bool,
    pub transaction_id: String,
    pub amount: Money,
    pub method: PaymentMethod,
}
