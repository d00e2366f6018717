//! Inventory service trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::ProductId;
use domain::{ProductStock, StockAdjustment};

use super::{INVENTORY_SERVICE, read, write};
use crate::error::ServiceError;

/// Trait for the inventory collaborator, which owns stock counters.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Returns the units in stock, or `None` for an unknown product.
    async fn stock_level(&self, product_id: ProductId) -> Result<Option<u32>, ServiceError>;

    /// Takes `adjustment.quantity` units out of stock if at least that many
    /// are available, atomically. Otherwise nothing changes and
    /// [`ServiceError::InsufficientStock`] is returned.
    async fn decrement_stock(
        &self,
        adjustment: StockAdjustment,
    ) -> Result<ProductStock, ServiceError>;
}

#[derive(Debug, Clone)]
struct StockedProduct {
    name: String,
    stock: i64,
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    products: HashMap<ProductId, StockedProduct>,
    received: Vec<StockAdjustment>,
    failing_products: HashSet<ProductId>,
    transient_failures: u32,
    fail_on_stock_level: bool,
    decrement_delay: Option<Duration>,
}

/// In-memory inventory service for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a product with the given stock, replacing any existing entry.
    pub fn add_product(&self, product_id: ProductId, name: impl Into<String>, stock: i64) {
        write(&self.state).products.insert(
            product_id,
            StockedProduct {
                name: name.into(),
                stock,
            },
        );
    }

    /// Makes every decrement of `product_id` fail as if the service were
    /// unreachable.
    pub fn set_fail_on_decrement(&self, product_id: ProductId) {
        write(&self.state).failing_products.insert(product_id);
    }

    /// Fails the next `count` decrements with a transient error.
    pub fn set_transient_failures(&self, count: u32) {
        write(&self.state).transient_failures = count;
    }

    /// Makes stock lookups fail as if the service were unreachable.
    pub fn set_fail_on_stock_level(&self, fail: bool) {
        write(&self.state).fail_on_stock_level = fail;
    }

    /// Delays every decrement, simulating a slow inventory service.
    pub fn set_decrement_delay(&self, delay: Option<Duration>) {
        write(&self.state).decrement_delay = delay;
    }

    /// Returns the current stock of a product.
    pub fn stock(&self, product_id: ProductId) -> Option<i64> {
        read(&self.state).products.get(&product_id).map(|p| p.stock)
    }

    /// Every decrement request received, in call order, including retries
    /// and failed attempts.
    pub fn received(&self) -> Vec<StockAdjustment> {
        read(&self.state).received.clone()
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn stock_level(&self, product_id: ProductId) -> Result<Option<u32>, ServiceError> {
        let state = read(&self.state);
        if state.fail_on_stock_level {
            return Err(ServiceError::unavailable(INVENTORY_SERVICE, "connection refused"));
        }
        Ok(state
            .products
            .get(&product_id)
            .map(|p| u32::try_from(p.stock.max(0)).unwrap_or(u32::MAX)))
    }

    async fn decrement_stock(
        &self,
        adjustment: StockAdjustment,
    ) -> Result<ProductStock, ServiceError> {
        let delay = read(&self.state).decrement_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        // Check and decrement under one write lock so concurrent checkouts
        // cannot oversell.
        let mut state = write(&self.state);
        state.received.push(adjustment);

        if state.failing_products.contains(&adjustment.product_id) {
            return Err(ServiceError::unavailable(INVENTORY_SERVICE, "connection refused"));
        }
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(ServiceError::unavailable(INVENTORY_SERVICE, "connection reset"));
        }

        let product = state
            .products
            .get_mut(&adjustment.product_id)
            .ok_or(ServiceError::ProductNotFound(adjustment.product_id))?;

        let requested = i64::from(adjustment.quantity);
        if product.stock < requested {
            return Err(ServiceError::InsufficientStock {
                product_id: adjustment.product_id,
                requested: adjustment.quantity,
                available: product.stock,
            });
        }
        product.stock -= requested;

        Ok(ProductStock {
            product_id: adjustment.product_id,
            name: Some(product.name.clone()),
            stock: product.stock,
        })
    }
}
