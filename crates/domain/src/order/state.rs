//! Order status.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of a committed order.
///
/// Every checkout commits its order as `Processing`; the other statuses
/// are set by later settlement or cancellation flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order and lines are committed; fulfillment side effects may still run.
    #[default]
    Processing,

    /// Payment settled.
    Paid,

    /// Order could not be fulfilled.
    Failed,

    /// Order was cancelled.
    Cancelled,
}

impl OrderStatus {
    /// Returns the status name as stored in the `orders.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(OrderStatus::Processing),
            "paid" => Ok(OrderStatus::Paid),
            "failed" => Ok(OrderStatus::Failed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}
