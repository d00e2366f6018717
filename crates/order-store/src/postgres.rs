use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use domain::{
    NewOrder, NewReconciliation, Order, OrderDetails, OrderLineDetails, OrderStatus,
    PaymentMethod, ReconciliationEntry, ReconciliationKind, ShippingAddress,
};
use sqlx::types::Json;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{OrderStore, OrderStoreError, Result};

const ORDER_COLUMNS: &str = r#"
    id, user_id, (total_amount * 100)::BIGINT AS total_cents, status,
    shipping_address, payment_method, payment_id, created_at
"#;

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let shipping_address: Json<ShippingAddress> = row.try_get("shipping_address")?;
        let payment_method: String = row.try_get("payment_method")?;

        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            total_amount: Money::from_cents(row.try_get("total_cents")?),
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| OrderStoreError::Corrupt(e.to_string()))?,
            shipping_address: shipping_address.0,
            payment_method: PaymentMethod::from(payment_method),
            payment_reference: row.try_get("payment_id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_line(row: &PgRow) -> Result<(OrderId, OrderLineDetails)> {
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity)
            .map_err(|_| OrderStoreError::Corrupt(format!("negative quantity {quantity}")))?;

        Ok((
            OrderId::new(row.try_get("order_id")?),
            OrderLineDetails {
                product_id: ProductId::new(row.try_get("product_id")?),
                quantity,
                unit_price: Money::from_cents(row.try_get("price_cents")?),
                name: row.try_get("name")?,
                image_url: row.try_get("image_url")?,
            },
        ))
    }

    fn row_to_reconciliation(row: &PgRow) -> Result<ReconciliationEntry> {
        let kind: String = row.try_get("kind")?;
        let order_id: Option<i64> = row.try_get("order_id")?;
        let product_id: Option<i64> = row.try_get("product_id")?;
        let amount: Option<i64> = row.try_get("amount_cents")?;

        Ok(ReconciliationEntry {
            id: row.try_get("id")?,
            record: NewReconciliation {
                kind: kind
                    .parse::<ReconciliationKind>()
                    .map_err(OrderStoreError::Corrupt)?,
                user_id: UserId::new(row.try_get("user_id")?),
                order_id: order_id.map(OrderId::new),
                product_id: product_id.map(ProductId::new),
                transaction_id: row.try_get("transaction_id")?,
                amount: amount.map(Money::from_cents),
                refunded: row.try_get("refunded")?,
                detail: row.try_get("detail")?,
            },
            recorded_at: row.try_get::<DateTime<Utc>, _>("recorded_at")?,
        })
    }

    /// Loads the lines of the given orders with product fields joined in,
    /// keeping each order's lines in insertion order.
    async fn lines_for(
        &self,
        order_ids: &[i64],
    ) -> Result<HashMap<OrderId, Vec<OrderLineDetails>>> {
        let rows = sqlx::query(
            r#"
            SELECT oi.order_id, oi.product_id, oi.quantity,
                   (oi.price * 100)::BIGINT AS price_cents,
                   p.name, p.image_url
            FROM order_items oi
            LEFT JOIN products p ON oi.product_id = p.id
            WHERE oi.order_id = ANY($1)
            ORDER BY oi.order_id, oi.id
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<OrderId, Vec<OrderLineDetails>> = HashMap::new();
        for row in &rows {
            let (order_id, line) = Self::row_to_line(row)?;
            lines.entry(order_id).or_default().push(line);
        }
        Ok(lines)
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, order), fields(user_id = %order.user_id, lines = order.lines.len()))]
    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        order.validate()?;

        // Header and lines commit together; dropping `tx` on any error
        // rolls the whole order back.
        let mut tx = self.pool.begin().await?;

        let query = format!(
            r#"
            INSERT INTO orders (user_id, total_amount, status, shipping_address, payment_method, payment_id)
            VALUES ($1, $2::BIGINT::NUMERIC / 100, $3, $4, $5, $6)
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let row = sqlx::query(&query)
            .bind(order.user_id.as_i64())
            .bind(order.total_amount.cents())
            .bind(OrderStatus::Processing.as_str())
            .bind(Json(&order.shipping_address))
            .bind(order.payment_method.as_str())
            .bind(&order.payment_reference)
            .fetch_one(&mut *tx)
            .await?;
        let committed = Self::row_to_order(&row)?;

        for line in &order.lines {
            let quantity = i32::try_from(line.quantity).map_err(|_| {
                OrderStoreError::Corrupt(format!("quantity {} too large", line.quantity))
            })?;

            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, price)
                VALUES ($1, $2, $3, $4::BIGINT::NUMERIC / 100)
                "#,
            )
            .bind(committed.id.as_i64())
            .bind(line.product_id.as_i64())
            .bind(quantity)
            .bind(line.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        metrics::counter!("order_store_inserts_total").increment(1);
        tracing::debug!(order_id = %committed.id, "order committed");

        Ok(committed)
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderDetails>> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&query)
            .bind(user_id.as_i64())
            .fetch_all(&self.pool)
            .await?;

        let orders = rows
            .iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();
        let mut lines = self.lines_for(&ids).await?;

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = lines.remove(&order.id).unwrap_or_default();
                OrderDetails { order, items }
            })
            .collect())
    }

    async fn order_by_id(&self, order_id: OrderId) -> Result<Option<OrderDetails>> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(order_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = Self::row_to_order(&row)?;
        let items = self
            .lines_for(&[order.id.as_i64()])
            .await?
            .remove(&order.id)
            .unwrap_or_default();

        Ok(Some(OrderDetails { order, items }))
    }

    async fn record_reconciliation(
        &self,
        record: NewReconciliation,
    ) -> Result<ReconciliationEntry> {
        let row = sqlx::query(
            r#"
            INSERT INTO checkout_reconciliations
                (kind, user_id, order_id, product_id, transaction_id, amount, refunded, detail)
            VALUES ($1, $2, $3, $4, $5, $6::BIGINT::NUMERIC / 100, $7, $8)
            RETURNING id, kind, user_id, order_id, product_id, transaction_id,
                      (amount * 100)::BIGINT AS amount_cents, refunded, detail, recorded_at
            "#,
        )
        .bind(record.kind.as_str())
        .bind(record.user_id.as_i64())
        .bind(record.order_id.map(|id| id.as_i64()))
        .bind(record.product_id.map(|id| id.as_i64()))
        .bind(&record.transaction_id)
        .bind(record.amount.map(|m| m.cents()))
        .bind(record.refunded)
        .bind(&record.detail)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_reconciliation(&row)
    }

    async fn reconciliations(&self) -> Result<Vec<ReconciliationEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, user_id, order_id, product_id, transaction_id,
                   (amount * 100)::BIGINT AS amount_cents, refunded, detail, recorded_at
            FROM checkout_reconciliations
            ORDER BY recorded_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_reconciliation).collect()
    }
}
