use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId, UserId};
use domain::{
    NewOrder, NewReconciliation, Order, OrderDetails, OrderLine, OrderLineDetails,
    ReconciliationEntry,
};
use tokio::sync::RwLock;

use crate::{OrderStore, OrderStoreError, Result};

#[derive(Debug, Clone)]
struct ProductInfo {
    name: String,
    image_url: Option<String>,
}

#[derive(Default)]
struct InMemoryState {
    orders: Vec<(Order, Vec<OrderLine>)>,
    products: HashMap<ProductId, ProductInfo>,
    reconciliations: Vec<ReconciliationEntry>,
    next_order_id: i64,
    next_reconciliation_id: i64,
    fail_on_insert: bool,
    insert_delay: Option<Duration>,
}

/// In-memory order store implementation for testing.
///
/// This implementation keeps orders in memory and provides the same
/// interface as the PostgreSQL implementation. Product names and images for
/// the read path come from products registered with [`register_product`].
///
/// [`register_product`]: InMemoryOrderStore::register_product
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a product's name and image available to order reads.
    pub async fn register_product(
        &self,
        product_id: ProductId,
        name: impl Into<String>,
        image_url: Option<String>,
    ) {
        self.state.write().await.products.insert(
            product_id,
            ProductInfo {
                name: name.into(),
                image_url,
            },
        );
    }

    /// Configures the store to fail every insert, simulating a database
    /// fault mid-transaction.
    pub async fn set_fail_on_insert(&self, fail: bool) {
        self.state.write().await.fail_on_insert = fail;
    }

    /// Delays every insert, simulating a slow database.
    pub async fn set_insert_delay(&self, delay: Option<Duration>) {
        self.state.write().await.insert_delay = delay;
    }

    /// Returns the total number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the total number of committed order lines.
    pub async fn line_count(&self) -> usize {
        self.state
            .read()
            .await
            .orders
            .iter()
            .map(|(_, lines)| lines.len())
            .sum()
    }

    fn details(
        products: &HashMap<ProductId, ProductInfo>,
        order: &Order,
        lines: &[OrderLine],
    ) -> OrderDetails {
        let items = lines
            .iter()
            .map(|line| {
                let product = products.get(&line.product_id);
                OrderLineDetails {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    name: product.map(|p| p.name.clone()),
                    image_url: product.and_then(|p| p.image_url.clone()),
                }
            })
            .collect();
        OrderDetails {
            order: order.clone(),
            items,
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        order.validate()?;

        let delay = self.state.read().await.insert_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        if state.fail_on_insert {
            return Err(OrderStoreError::Unavailable(
                "connection lost during transaction".to_string(),
            ));
        }

        state.next_order_id += 1;
        let id = OrderId::new(state.next_order_id);
        let (order, lines) = order.into_order(id, Utc::now());
        state.orders.push((order.clone(), lines));

        Ok(order)
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderDetails>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .iter()
            .filter(|(order, _)| order.user_id == user_id)
            .map(|(order, lines)| Self::details(&state.products, order, lines))
            .collect();

        orders.sort_by(|a, b| {
            b.order
                .created_at
                .cmp(&a.order.created_at)
                .then(b.order.id.cmp(&a.order.id))
        });
        Ok(orders)
    }

    async fn order_by_id(&self, order_id: OrderId) -> Result<Option<OrderDetails>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .find(|(order, _)| order.id == order_id)
            .map(|(order, lines)| Self::details(&state.products, order, lines)))
    }

    async fn record_reconciliation(
        &self,
        record: NewReconciliation,
    ) -> Result<ReconciliationEntry> {
        let mut state = self.state.write().await;
        state.next_reconciliation_id += 1;
        let entry = ReconciliationEntry {
            id: state.next_reconciliation_id,
            record,
            recorded_at: Utc::now(),
        };
        state.reconciliations.push(entry.clone());
        Ok(entry)
    }

    async fn reconciliations(&self) -> Result<Vec<ReconciliationEntry>> {
        let state = self.state.read().await;
        let mut entries = state.reconciliations.clone();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use domain::{CartLine, CartSnapshot, OrderStatus, PaymentMethod, ShippingAddress};

    fn new_order(user: i64, lines: &[(i64, i64, u32)]) -> NewOrder {
        let cart = CartSnapshot::new(
            lines
                .iter()
                .map(|&(product, price, qty)| {
                    CartLine::new(ProductId::new(product), "item", Money::from_cents(price), qty)
                })
                .collect(),
        );
        NewOrder::from_cart(
            UserId::new(user),
            &cart,
            ShippingAddress::default(),
            PaymentMethod::CreditCard,
            "TXN-1",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = InMemoryOrderStore::new();

        let first = store.insert_order(new_order(1, &[(1, 100, 1)])).await.unwrap();
        let second = store.insert_order(new_order(1, &[(2, 100, 1)])).await.unwrap();

        assert_eq!(first.id, OrderId::new(1));
        assert_eq!(second.id, OrderId::new(2));
        assert_eq!(first.status, OrderStatus::Processing);
        assert_eq!(store.order_count().await, 2);
    }

    #[tokio::test]
    async fn test_failed_insert_writes_nothing() {
        let store = InMemoryOrderStore::new();
        store.set_fail_on_insert(true).await;

        let result = store.insert_order(new_order(1, &[(1, 100, 2), (2, 50, 1)])).await;

        assert!(matches!(result, Err(OrderStoreError::Unavailable(_))));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.line_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_order_is_rejected() {
        let store = InMemoryOrderStore::new();
        let mut order = new_order(1, &[(1, 100, 1)]);
        order.lines.clear();

        let result = store.insert_order(order).await;
        assert!(matches!(result, Err(OrderStoreError::InvalidOrder(_))));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_orders_for_user_newest_first_with_product_join() {
        let store = InMemoryOrderStore::new();
        store
            .register_product(ProductId::new(1), "Laptop", Some("laptop.png".to_string()))
            .await;

        store.insert_order(new_order(1, &[(1, 100, 1)])).await.unwrap();
        store.insert_order(new_order(2, &[(1, 100, 1)])).await.unwrap();
        store.insert_order(new_order(1, &[(3, 10, 4)])).await.unwrap();

        let orders = store.orders_for_user(UserId::new(1)).await.unwrap();
        let ids: Vec<i64> = orders.iter().map(|o| o.order.id.as_i64()).collect();
        assert_eq!(ids, vec![3, 1]);

        let oldest = &orders[1];
        assert_eq!(oldest.items[0].name.as_deref(), Some("Laptop"));
        assert_eq!(oldest.items[0].image_url.as_deref(), Some("laptop.png"));
        assert!(orders[0].items[0].name.is_none());
    }

    #[tokio::test]
    async fn test_order_by_id_returns_none_when_missing() {
        let store = InMemoryOrderStore::new();
        assert!(store.order_by_id(OrderId::new(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reconciliations_are_recorded_newest_first() {
        let store = InMemoryOrderStore::new();
        store
            .record_reconciliation(NewReconciliation::cart_clear_failed(
                UserId::new(1),
                OrderId::new(1),
                "first",
            ))
            .await
            .unwrap();
        store
            .record_reconciliation(NewReconciliation::cart_clear_failed(
                UserId::new(1),
                OrderId::new(2),
                "second",
            ))
            .await
            .unwrap();

        let entries = store.reconciliations().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].record.detail, "second");
    }
}
