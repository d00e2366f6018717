//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need a Docker daemon.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --ignored
//! ```

use std::sync::Arc;

use common::{Money, OrderId, ProductId, UserId};
use domain::{
    CartLine, CartSnapshot, NewOrder, NewReconciliation, OrderStatus, PaymentMethod,
    ReconciliationKind, ShippingAddress,
};
use order_store::{OrderStore, OrderStoreError, PostgresOrderStore};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresOrderStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE order_items, orders, checkout_reconciliations, cart_items, products RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO products (id, name, price, stock, image_url) VALUES (1, 'Laptop', 650.00, 5, 'laptop.png')",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresOrderStore::new(pool)
}

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
        ShippingAddress {
            full_name: "Asha Rao".to_string(),
            city: "Pune".to_string(),
            ..ShippingAddress::default()
        },
        PaymentMethod::CreditCard,
        "TXN-1",
    )
    .unwrap()
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn test_insert_and_read_back_order() {
    let store = get_test_store().await;

    let order = store
        .insert_order(new_order(7, &[(1, 65000, 1), (2, 1999, 3)]))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.total_amount, Money::from_cents(70997));
    assert_eq!(order.payment_reference, "TXN-1");

    let details = store.order_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(details.order, order);
    assert_eq!(details.items.len(), 2);
    assert_eq!(details.items[0].name.as_deref(), Some("Laptop"));
    assert_eq!(details.items[0].image_url.as_deref(), Some("laptop.png"));
    assert_eq!(details.items[1].unit_price, Money::from_cents(1999));
    assert!(details.items[1].name.is_none());
    assert_eq!(details.order.shipping_address.city, "Pune");
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn test_purchase_price_survives_catalog_price_change() {
    let store = get_test_store().await;
    let order = store
        .insert_order(new_order(7, &[(1, 65000, 1)]))
        .await
        .unwrap();

    sqlx::query("UPDATE products SET price = 1.00 WHERE id = 1")
        .execute(store.pool())
        .await
        .unwrap();

    let details = store.order_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(details.items[0].unit_price, Money::from_cents(65000));
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn test_failed_line_insert_rolls_back_header() {
    let store = get_test_store().await;

    // A quantity beyond the INTEGER column range aborts the transaction
    // after the header insert.
    let mut order = new_order(7, &[(1, 1, 1)]);
    order.lines[0].quantity = u32::MAX;
    order.total_amount = Money::from_cents(i64::from(u32::MAX));

    let result = store.insert_order(order).await;
    assert!(matches!(result, Err(OrderStoreError::Corrupt(_))));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn test_orders_for_user_are_newest_first_and_stable() {
    let store = get_test_store().await;
    let first = store.insert_order(new_order(7, &[(1, 100, 1)])).await.unwrap();
    store.insert_order(new_order(8, &[(1, 100, 1)])).await.unwrap();
    let third = store.insert_order(new_order(7, &[(1, 100, 2)])).await.unwrap();

    let orders = store.orders_for_user(UserId::new(7)).await.unwrap();
    let ids: Vec<OrderId> = orders.iter().map(|o| o.order.id).collect();
    assert_eq!(ids, vec![third.id, first.id]);

    let again = store.orders_for_user(UserId::new(7)).await.unwrap();
    assert_eq!(orders, again);
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn test_reconciliation_round_trip() {
    let store = get_test_store().await;

    store
        .record_reconciliation(NewReconciliation::stock_adjustment_failed(
            UserId::new(7),
            OrderId::new(3),
            ProductId::new(1),
            "insufficient stock",
        ))
        .await
        .unwrap();

    let entries = store.reconciliations().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record.kind, ReconciliationKind::StockAdjustmentFailed);
    assert_eq!(entries[0].record.product_id, Some(ProductId::new(1)));
    assert!(entries[0].record.amount.is_none());
}
