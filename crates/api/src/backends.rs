//! Collaborator selection at start-up.

use std::sync::Arc;
use std::time::Duration;

use checkout::{
    CartService, CheckoutConfig, CheckoutCoordinator, HttpCartService, HttpInventoryService,
    InMemoryCartService, InMemoryInventoryService, InventoryService, OrderQuery, PaymentGateway,
    PostgresCartService, PostgresInventoryService, SimulatedPaymentGateway,
};
use order_store::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::AppState;
use crate::config::Config;

/// Errors that prevent the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Order store setup failed: {0}")]
    OrderStore(#[from] order_store::OrderStoreError),

    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Every collaborator kept in memory, with handles for seeding and fault
/// injection.
#[derive(Clone, Default)]
pub struct InMemoryBackends {
    pub cart: InMemoryCartService,
    pub inventory: InMemoryInventoryService,
    pub payment: SimulatedPaymentGateway,
    pub store: InMemoryOrderStore,
}

impl InMemoryBackends {
    pub fn new(payment_latency: Duration) -> Self {
        Self {
            payment: SimulatedPaymentGateway::with_latency(payment_latency),
            ..Self::default()
        }
    }

    /// Builds application state over these backends.
    pub fn state(&self, checkout: CheckoutConfig, instance_id: impl Into<String>) -> Arc<AppState> {
        let store: Arc<dyn OrderStore> = Arc::new(self.store.clone());
        Arc::new(AppState {
            coordinator: CheckoutCoordinator::new(
                Arc::new(self.cart.clone()),
                Arc::new(self.payment.clone()),
                Arc::new(self.inventory.clone()),
                store.clone(),
                checkout,
            ),
            query: OrderQuery::new(store),
            instance_id: instance_id.into(),
        })
    }
}

/// Builds application state from configuration.
///
/// With `DATABASE_URL` the order store is Postgres (migrations run here),
/// otherwise in memory. Cart and inventory use their HTTP service when a
/// URL is configured, the shared database when only that is available, and
/// memory otherwise.
pub async fn build_state(config: &Config) -> Result<Arc<AppState>, StartupError> {
    let pool = match &config.database_url {
        Some(url) => Some(PgPoolOptions::new().max_connections(10).connect(url).await?),
        None => None,
    };

    let store: Arc<dyn OrderStore> = match &pool {
        Some(pool) => {
            let store = PostgresOrderStore::new(pool.clone());
            store.run_migrations().await?;
            Arc::new(store)
        }
        None => Arc::new(InMemoryOrderStore::new()),
    };

    let cart = cart_service(config, pool.as_ref())?;
    let inventory = inventory_service(config, pool.as_ref())?;
    let payment: Arc<dyn PaymentGateway> =
        Arc::new(SimulatedPaymentGateway::with_latency(config.payment_latency));

    tracing::info!(
        order_store = if pool.is_some() { "postgres" } else { "memory" },
        cart = backend_name(config.cart_service_url.as_deref(), pool.is_some()),
        inventory = backend_name(config.product_service_url.as_deref(), pool.is_some()),
        "collaborators configured"
    );

    Ok(Arc::new(AppState {
        coordinator: CheckoutCoordinator::new(cart, payment, inventory, store.clone(), config.checkout()),
        query: OrderQuery::new(store),
        instance_id: config.instance_id.clone(),
    }))
}

fn cart_service(
    config: &Config,
    pool: Option<&PgPool>,
) -> Result<Arc<dyn CartService>, StartupError> {
    Ok(match (&config.cart_service_url, pool) {
        (Some(url), _) => Arc::new(HttpCartService::new(url.as_str(), config.call_timeout)?),
        (None, Some(pool)) => Arc::new(PostgresCartService::new(pool.clone())),
        (None, None) => Arc::new(InMemoryCartService::new()),
    })
}

fn inventory_service(
    config: &Config,
    pool: Option<&PgPool>,
) -> Result<Arc<dyn InventoryService>, StartupError> {
    Ok(match (&config.product_service_url, pool) {
        (Some(url), _) => Arc::new(HttpInventoryService::new(url.as_str(), config.call_timeout)?),
        (None, Some(pool)) => Arc::new(PostgresInventoryService::new(pool.clone())),
        (None, None) => Arc::new(InMemoryInventoryService::new()),
    })
}

fn backend_name(url: Option<&str>, has_database: bool) -> &'static str {
    match (url, has_database) {
        (Some(_), _) => "http",
        (None, true) => "postgres",
        (None, false) => "memory",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_selection_prefers_http_then_database() {
        assert_eq!(backend_name(Some("http://cart"), true), "http");
        assert_eq!(backend_name(None, true), "postgres");
        assert_eq!(backend_name(None, false), "memory");
    }

    #[tokio::test]
    async fn test_default_config_builds_in_memory_state() {
        let state = build_state(&Config::default()).await.unwrap();
        assert_eq!(state.instance_id, "local");
        assert!(state.query.list_reconciliations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_http_collaborators_are_built_without_connecting() {
        let config = Config {
            cart_service_url: Some("http://localhost:1".to_string()),
            product_service_url: Some("http://localhost:2".to_string()),
            ..Config::default()
        };
        assert!(build_state(&config).await.is_ok());
    }
}
