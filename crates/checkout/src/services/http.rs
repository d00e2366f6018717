//! HTTP clients for the cart and product services.

use std::time::Duration;

use async_trait::async_trait;
use common::{Money, ProductId, UserId};
use domain::{CartLine, CartSnapshot, ProductStock, StockAdjustment};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::{CART_SERVICE, CartService, INVENTORY_SERVICE, InventoryService};
use crate::error::ServiceError;

/// A price as the upstream services send it: a JSON number, or a numeric
/// string when it comes straight from a Postgres `NUMERIC` column.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WirePrice {
    Number(f64),
    Text(String),
}

impl WirePrice {
    fn to_money(&self) -> Option<Money> {
        match self {
            WirePrice::Number(amount) => Money::from_major_f64(*amount),
            WirePrice::Text(amount) => Money::parse_major(amount),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireCart {
    #[serde(default)]
    items: Vec<WireCartItem>,
    #[serde(default)]
    total: Option<WirePrice>,
}

#[derive(Debug, Deserialize)]
struct WireCartItem {
    product_id: i64,
    #[serde(default)]
    name: Option<String>,
    price: WirePrice,
    quantity: u32,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireProduct {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    stock: Option<i64>,
}

fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

fn send_error(service: &'static str, timeout: Duration, err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout {
            service,
            after: timeout,
        }
    } else if err.is_decode() {
        ServiceError::invalid_response(service, err)
    } else {
        ServiceError::unavailable(service, err)
    }
}

fn status_error(service: &'static str, status: StatusCode) -> ServiceError {
    if status.is_server_error() {
        ServiceError::unavailable(service, format!("status {status}"))
    } else {
        ServiceError::invalid_response(service, format!("unexpected status {status}"))
    }
}

/// Client for the cart service (`GET`/`DELETE /cart/{userId}`).
#[derive(Debug, Clone)]
pub struct HttpCartService {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpCartService {
    /// Creates a client whose requests are bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn cart_url(&self, user_id: UserId) -> String {
        format!("{}/cart/{}", self.base_url, user_id)
    }

    fn into_snapshot(user_id: UserId, cart: WireCart) -> Result<CartSnapshot, ServiceError> {
        let lines = cart
            .items
            .into_iter()
            .map(|item| {
                let unit_price = item.price.to_money().ok_or_else(|| {
                    ServiceError::invalid_response(
                        CART_SERVICE,
                        format!("unparseable price for product {}", item.product_id),
                    )
                })?;
                Ok(CartLine {
                    product_id: ProductId::new(item.product_id),
                    name: item.name.unwrap_or_default(),
                    unit_price,
                    quantity: item.quantity,
                    image_url: item.image_url,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let snapshot = CartSnapshot::new(lines);
        if let Some(reported) = cart.total.as_ref().and_then(WirePrice::to_money) {
            if snapshot.total() != Some(reported) {
                tracing::warn!(
                    %user_id,
                    reported = %reported,
                    computed = ?snapshot.total(),
                    "cart total disagrees with its lines, using computed total"
                );
            }
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl CartService for HttpCartService {
    #[tracing::instrument(skip(self))]
    async fn get_cart(&self, user_id: UserId) -> Result<CartSnapshot, ServiceError> {
        let response = self
            .client
            .get(self.cart_url(user_id))
            .send()
            .await
            .map_err(|e| send_error(CART_SERVICE, self.timeout, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(CartSnapshot::empty());
        }
        if !response.status().is_success() {
            return Err(status_error(CART_SERVICE, response.status()));
        }

        let cart: WireCart = response
            .json()
            .await
            .map_err(|e| send_error(CART_SERVICE, self.timeout, e))?;
        Self::into_snapshot(user_id, cart)
    }

    #[tracing::instrument(skip(self))]
    async fn clear_cart(&self, user_id: UserId) -> Result<(), ServiceError> {
        let response = self
            .client
            .delete(self.cart_url(user_id))
            .send()
            .await
            .map_err(|e| send_error(CART_SERVICE, self.timeout, e))?;

        if !response.status().is_success() {
            return Err(status_error(CART_SERVICE, response.status()));
        }
        Ok(())
    }
}

/// Client for the product service's stock endpoints.
#[derive(Debug, Clone)]
pub struct HttpInventoryService {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpInventoryService {
    /// Creates a client whose requests are bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn read_product(&self, response: Response) -> Result<WireProduct, ServiceError> {
        response
            .json()
            .await
            .map_err(|e| send_error(INVENTORY_SERVICE, self.timeout, e))
    }
}

#[async_trait]
impl InventoryService for HttpInventoryService {
    #[tracing::instrument(skip(self))]
    async fn stock_level(&self, product_id: ProductId) -> Result<Option<u32>, ServiceError> {
        let response = self
            .client
            .get(format!("{}/products/{}", self.base_url, product_id))
            .send()
            .await
            .map_err(|e| send_error(INVENTORY_SERVICE, self.timeout, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(INVENTORY_SERVICE, response.status()));
        }

        let product = self.read_product(response).await?;
        Ok(product
            .stock
            .map(|stock| u32::try_from(stock.max(0)).unwrap_or(u32::MAX)))
    }

    #[tracing::instrument(skip(self, adjustment), fields(product_id = %adjustment.product_id, quantity = adjustment.quantity))]
    async fn decrement_stock(
        &self,
        adjustment: StockAdjustment,
    ) -> Result<ProductStock, ServiceError> {
        let response = self
            .client
            .patch(format!(
                "{}/products/{}/stock",
                self.base_url, adjustment.product_id
            ))
            .json(&serde_json::json!({ "quantity": adjustment.quantity }))
            .send()
            .await
            .map_err(|e| send_error(INVENTORY_SERVICE, self.timeout, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ServiceError::ProductNotFound(adjustment.product_id)),
            StatusCode::CONFLICT => {
                // The conflict body carries the current product when the
                // product service provides it.
                let available = response
                    .json::<WireProduct>()
                    .await
                    .ok()
                    .and_then(|p| p.stock)
                    .unwrap_or(0);
                Err(ServiceError::InsufficientStock {
                    product_id: adjustment.product_id,
                    requested: adjustment.quantity,
                    available,
                })
            }
            status if status.is_success() => {
                let product = self.read_product(response).await?;
                Ok(ProductStock {
                    product_id: ProductId::new(product.id),
                    name: product.name,
                    stock: product.stock.unwrap_or_default(),
                })
            }
            status => Err(status_error(INVENTORY_SERVICE, status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_prices_accept_numbers_and_strings() {
        let number: WirePrice = serde_json::from_str("650").unwrap();
        let text: WirePrice = serde_json::from_str("\"19.99\"").unwrap();

        assert_eq!(number.to_money(), Some(Money::from_cents(65000)));
        assert_eq!(text.to_money(), Some(Money::from_cents(1999)));
    }

    #[test]
    fn test_computed_total_wins_over_reported_total() {
        let cart: WireCart = serde_json::from_value(serde_json::json!({
            "items": [
                {"product_id": 1, "name": "Laptop", "price": "650.00", "quantity": 1, "image_url": null},
                {"product_id": 2, "name": "Mouse", "price": 19.99, "quantity": 2}
            ],
            "total": 1.0
        }))
        .unwrap();

        let snapshot = HttpCartService::into_snapshot(UserId::new(1), cart).unwrap();
        assert_eq!(snapshot.total(), Some(Money::from_cents(68998)));
        assert_eq!(snapshot.lines()[1].unit_price, Money::from_cents(1999));
    }

    #[test]
    fn test_unparseable_price_is_invalid_response() {
        let cart: WireCart = serde_json::from_value(serde_json::json!({
            "items": [{"product_id": 1, "price": "free", "quantity": 1}]
        }))
        .unwrap();

        let err = HttpCartService::into_snapshot(UserId::new(1), cart).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse { .. }));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let service = HttpCartService::new("http://cart:3002/", Duration::from_secs(1)).unwrap();
        assert_eq!(service.cart_url(UserId::new(5)), "http://cart:3002/cart/5");
    }
}
