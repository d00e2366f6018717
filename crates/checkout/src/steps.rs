//! Checkout saga step names, in execution order.

/// Read the user's cart.
pub const STEP_READ_CART: &str = "read_cart";

/// Check known stock levels before charging.
pub const STEP_CHECK_STOCK: &str = "check_stock";

/// Authorize payment for the cart total.
pub const STEP_AUTHORIZE_PAYMENT: &str = "authorize_payment";

/// Insert the order and its lines in one transaction.
pub const STEP_RECORD_ORDER: &str = "record_order";

/// Hand stock decrements and the cart clear to the background task.
pub const STEP_SUBMIT_FULFILLMENT: &str = "submit_fulfillment";
