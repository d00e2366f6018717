use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{NewOrder, NewReconciliation, Order, OrderDetails, ReconciliationEntry};

use crate::Result;

/// Core trait for order store implementations.
///
/// The order store owns the only transactional boundary in checkout: an
/// order header and its lines are written together or not at all.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts an order and all of its lines atomically.
    ///
    /// The order is validated first; an invalid order is rejected with
    /// `InvalidOrder` and nothing is written. On any failure the
    /// transaction rolls back and no order exists afterwards.
    ///
    /// Returns the committed header with its assigned id and timestamp.
    async fn insert_order(&self, order: NewOrder) -> Result<Order>;

    /// Retrieves all orders of a user with their lines.
    ///
    /// Orders are returned newest first (creation time, then id).
    /// Product name and image are joined in at read time.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderDetails>>;

    /// Retrieves a single order with its lines.
    async fn order_by_id(&self, order_id: OrderId) -> Result<Option<OrderDetails>>;

    /// Durably records an inconsistency that needs follow-up.
    async fn record_reconciliation(&self, record: NewReconciliation)
    -> Result<ReconciliationEntry>;

    /// Retrieves all reconciliation records, newest first.
    async fn reconciliations(&self) -> Result<Vec<ReconciliationEntry>>;
}
