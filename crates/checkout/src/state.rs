//! Where a checkout stands with respect to the customer's money.

/// Lifecycle of one checkout.
///
/// ```text
/// Pending ──► Charged ──┬──► Placed
///    │                  └──► Compensating ──► Failed
///    └──► Failed
/// ```
///
/// Only a `Charged` checkout holds money without an order, so only it can
/// move to `Compensating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutState {
    /// Cart read and stock check; nothing charged yet.
    Pending,

    /// Payment captured, order not yet recorded.
    Charged,

    /// The order could not be recorded and the charge is being refunded.
    Compensating,

    /// The order is committed.
    Placed,

    /// The checkout was aborted.
    Failed,
}

impl CheckoutState {
    /// True while a captured payment is not backed by an order.
    pub fn holds_charge(&self) -> bool {
        matches!(self, CheckoutState::Charged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Pending => "pending",
            CheckoutState::Charged => "charged",
            CheckoutState::Compensating => "compensating",
            CheckoutState::Placed => "placed",
            CheckoutState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
