//! Collaborator traits and their implementations.
//!
//! Each collaborator has an in-memory implementation for tests and local
//! runs, plus the adapters used in deployment: HTTP clients for the cart and
//! product services and direct Postgres adapters for a shared database.

pub mod cart;
pub mod http;
pub mod inventory;
pub mod payment;
pub mod postgres;

use std::future::Future;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

pub use cart::{CartService, InMemoryCartService};
pub use http::{HttpCartService, HttpInventoryService};
pub use inventory::{InMemoryInventoryService, InventoryService};
pub use payment::{PaymentGateway, SimulatedPaymentGateway};
pub use postgres::{PostgresCartService, PostgresInventoryService};

use crate::error::ServiceError;

pub(crate) const CART_SERVICE: &str = "cart";
pub(crate) const PAYMENT_SERVICE: &str = "payment";
pub(crate) const INVENTORY_SERVICE: &str = "inventory";

/// Runs a collaborator call with a deadline. Expiry becomes
/// [`ServiceError::Timeout`] and the call is dropped.
pub(crate) async fn with_deadline<T, F>(
    service: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout {
            service,
            after: limit,
        }),
    }
}

// The in-memory fakes never hold a lock across an await, so a poisoned lock
// only means another test thread panicked; keep serving the data.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
