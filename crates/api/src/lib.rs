//! HTTP order service with observability.
//!
//! Provides the storefront's order endpoints on top of the checkout saga,
//! with structured logging (tracing) and Prometheus metrics.

pub mod backends;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{CheckoutCoordinator, OrderQuery};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use backends::{InMemoryBackends, StartupError, build_state};
pub use config::{Config, LogFormat};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub coordinator: CheckoutCoordinator,
    pub query: OrderQuery,
    /// Reported by `/health` to tell replicas apart.
    pub instance_id: String,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::health::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create))
        .route("/orders/{user_id}", get(routes::orders::list_for_user))
        .route("/orders/detail/{order_id}", get(routes::orders::get))
        .route("/reconciliations", get(routes::reconciliations::list))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
