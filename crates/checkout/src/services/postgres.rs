//! Postgres adapters for deployments where the cart and product tables
//! share the order database.

use async_trait::async_trait;
use common::{Money, ProductId, UserId};
use domain::{CartLine, CartSnapshot, ProductStock, StockAdjustment};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::{CART_SERVICE, CartService, INVENTORY_SERVICE, InventoryService};
use crate::error::ServiceError;

fn db_error(service: &'static str, err: sqlx::Error) -> ServiceError {
    match err {
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => ServiceError::invalid_response(service, err),
        other => ServiceError::unavailable(service, other),
    }
}

fn row_to_stock(row: &PgRow) -> Result<ProductStock, sqlx::Error> {
    Ok(ProductStock {
        product_id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        stock: row.try_get("stock")?,
    })
}

/// Reads carts straight from the `cart_items` table.
#[derive(Clone)]
pub struct PostgresCartService {
    pool: PgPool,
}

impl PostgresCartService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartService for PostgresCartService {
    #[tracing::instrument(skip(self))]
    async fn get_cart(&self, user_id: UserId) -> Result<CartSnapshot, ServiceError> {
        let rows = sqlx::query(
            r#"
            SELECT c.product_id, c.quantity, p.name, p.image_url,
                   (p.price * 100)::BIGINT AS price_cents
            FROM cart_items c
            JOIN products p ON c.product_id = p.id
            WHERE c.user_id = $1
            ORDER BY c.id
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error(CART_SERVICE, e))?;

        let lines = rows
            .iter()
            .map(|row| {
                let quantity: i32 = row.try_get("quantity")?;
                Ok(CartLine {
                    product_id: ProductId::new(row.try_get("product_id")?),
                    name: row.try_get("name")?,
                    unit_price: Money::from_cents(row.try_get("price_cents")?),
                    quantity: u32::try_from(quantity).unwrap_or_default(),
                    image_url: row.try_get("image_url")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| db_error(CART_SERVICE, e))?;

        Ok(CartSnapshot::new(lines))
    }

    #[tracing::instrument(skip(self))]
    async fn clear_cart(&self, user_id: UserId) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(CART_SERVICE, e))?;
        Ok(())
    }
}

/// Adjusts stock straight in the `products` table.
#[derive(Clone)]
pub struct PostgresInventoryService {
    pool: PgPool,
}

impl PostgresInventoryService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InventoryService for PostgresInventoryService {
    async fn stock_level(&self, product_id: ProductId) -> Result<Option<u32>, ServiceError> {
        let stock: Option<i64> =
            sqlx::query_scalar("SELECT stock FROM products WHERE id = $1 AND active = TRUE")
                .bind(product_id.as_i64())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error(INVENTORY_SERVICE, e))?;

        Ok(stock.map(|s| u32::try_from(s.max(0)).unwrap_or(u32::MAX)))
    }

    #[tracing::instrument(skip(self, adjustment), fields(product_id = %adjustment.product_id, quantity = adjustment.quantity))]
    async fn decrement_stock(
        &self,
        adjustment: StockAdjustment,
    ) -> Result<ProductStock, ServiceError> {
        let quantity = i64::from(adjustment.quantity);

        // Single conditional statement: the row lock taken by UPDATE
        // serializes concurrent decrements of the same product.
        let row = sqlx::query(
            r#"
            UPDATE products SET stock = stock - $1
            WHERE id = $2 AND stock >= $1
            RETURNING id, name, stock
            "#,
        )
        .bind(quantity)
        .bind(adjustment.product_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error(INVENTORY_SERVICE, e))?;

        if let Some(row) = row {
            return row_to_stock(&row).map_err(|e| db_error(INVENTORY_SERVICE, e));
        }

        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(adjustment.product_id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error(INVENTORY_SERVICE, e))?;

        match available {
            None => Err(ServiceError::ProductNotFound(adjustment.product_id)),
            Some(available) => Err(ServiceError::InsufficientStock {
                product_id: adjustment.product_id,
                requested: adjustment.quantity,
                available,
            }),
        }
    }
}
