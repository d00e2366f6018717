//! Read path for orders and the reconciliation log.

use std::sync::Arc;

use common::{OrderId, UserId};
use domain::{OrderDetails, ReconciliationEntry};
use order_store::OrderStore;

use crate::error::QueryError;

/// Read-only access to committed orders.
#[derive(Clone)]
pub struct OrderQuery {
    store: Arc<dyn OrderStore>,
}

impl OrderQuery {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Lists a user's orders, newest first, each with its lines.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrderDetails>, QueryError> {
        Ok(self.store.orders_for_user(user_id).await?)
    }

    /// Fetches one order with its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<OrderDetails, QueryError> {
        self.store
            .order_by_id(order_id)
            .await?
            .ok_or(QueryError::OrderNotFound(order_id))
    }

    /// Lists every reconciliation entry, newest first.
    pub async fn list_reconciliations(&self) -> Result<Vec<ReconciliationEntry>, QueryError> {
        Ok(self.store.reconciliations().await?)
    }
}
