//! Checkout saga for the order service.
//!
//! Placing an order spans four collaborators that fail independently:
//! 1. Read the user's cart (and pre-check stock)
//! 2. Authorize payment
//! 3. Insert the order and its lines in one order-store transaction
//! 4. Decrement stock per line and clear the cart, in the background
//!
//! Steps 1-3 abort the checkout on failure. If the order insert fails after
//! payment was captured, the payment is refunded and the event is written
//! to the reconciliation log. Step 4 never fails the checkout; its failures
//! are retried, logged and recorded.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod fulfillment;
pub mod query;
pub mod retry;
pub mod saga;
pub mod services;
pub mod state;
pub mod steps;

pub use config::CheckoutConfig;
pub use coordinator::{CheckoutCoordinator, ORDER_PLACED_MESSAGE, PlacedOrder};
pub use error::{CheckoutError, FulfillmentError, QueryError, ServiceError};
pub use fulfillment::{FulfillmentReport, SideEffect, SideEffectOutcome};
pub use query::OrderQuery;
pub use retry::RetryConfig;
pub use saga::CheckoutSaga;
pub use services::{
    CartService, HttpCartService, HttpInventoryService, InMemoryCartService,
    InMemoryInventoryService, InventoryService, PaymentGateway, PostgresCartService,
    PostgresInventoryService, SimulatedPaymentGateway,
};
pub use state::CheckoutState;
