//! Cart service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::UserId;
use domain::{CartLine, CartSnapshot};

use super::{CART_SERVICE, read, write};
use crate::error::ServiceError;

/// Trait for the cart collaborator.
#[async_trait]
pub trait CartService: Send + Sync {
    /// Returns the user's cart with lines in cart order. A user without a
    /// cart gets an empty snapshot.
    async fn get_cart(&self, user_id: UserId) -> Result<CartSnapshot, ServiceError>;

    /// Removes every line from the user's cart.
    async fn clear_cart(&self, user_id: UserId) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<UserId, Vec<CartLine>>,
    cleared: Vec<UserId>,
    fail_on_get: bool,
    fail_on_clear: bool,
    transient_clear_failures: u32,
    get_delay: Option<Duration>,
}

/// In-memory cart service for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartService {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line to the user's cart, merging quantities for a product
    /// already in the cart.
    pub fn add_line(&self, user_id: UserId, line: CartLine) {
        let mut state = write(&self.state);
        let lines = state.carts.entry(user_id).or_default();
        match lines.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => lines.push(line),
        }
    }

    /// Configures the service to fail every cart read.
    pub fn set_fail_on_get(&self, fail: bool) {
        write(&self.state).fail_on_get = fail;
    }

    /// Configures the service to fail every cart clear.
    pub fn set_fail_on_clear(&self, fail: bool) {
        write(&self.state).fail_on_clear = fail;
    }

    /// Fails the next `count` cart clears with a transient error.
    pub fn set_transient_clear_failures(&self, count: u32) {
        write(&self.state).transient_clear_failures = count;
    }

    /// Delays every cart read, simulating a slow cart service.
    pub fn set_get_delay(&self, delay: Option<Duration>) {
        write(&self.state).get_delay = delay;
    }

    /// Number of lines currently in the user's cart.
    pub fn line_count(&self, user_id: UserId) -> usize {
        read(&self.state).carts.get(&user_id).map_or(0, Vec::len)
    }

    /// Users whose carts were cleared, in call order.
    pub fn cleared_users(&self) -> Vec<UserId> {
        read(&self.state).cleared.clone()
    }
}

#[async_trait]
impl CartService for InMemoryCartService {
    async fn get_cart(&self, user_id: UserId) -> Result<CartSnapshot, ServiceError> {
        let delay = read(&self.state).get_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = read(&self.state);
        if state.fail_on_get {
            return Err(ServiceError::unavailable(CART_SERVICE, "connection refused"));
        }
        let lines = state.carts.get(&user_id).cloned().unwrap_or_default();
        Ok(CartSnapshot::new(lines))
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), ServiceError> {
        let mut state = write(&self.state);
        if state.fail_on_clear {
            return Err(ServiceError::unavailable(CART_SERVICE, "connection refused"));
        }
        if state.transient_clear_failures > 0 {
            state.transient_clear_failures -= 1;
            return Err(ServiceError::unavailable(CART_SERVICE, "connection reset"));
        }

        state.carts.remove(&user_id);
        state.cleared.push(user_id);
        Ok(())
    }
}
