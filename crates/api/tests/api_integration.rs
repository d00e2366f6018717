//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::{AppState, InMemoryBackends};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::{CheckoutConfig, RetryConfig};
use common::{Money, ProductId, UserId};
use domain::CartLine;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

const USER: UserId = UserId::new(7);

fn checkout_config() -> CheckoutConfig {
    CheckoutConfig {
        call_timeout: Duration::from_secs(1),
        fulfillment_retry: RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
        },
    }
}

fn setup() -> (axum::Router, InMemoryBackends, Arc<AppState>) {
    let backends = InMemoryBackends::new(Duration::ZERO);
    let state = backends.state(checkout_config(), "test-1");
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, backends, state)
}

async fn seed_cart(backends: &InMemoryBackends, user: UserId, lines: &[(i64, &str, i64, u32)]) {
    for &(product, name, cents, quantity) in lines {
        let product_id = ProductId::new(product);
        backends.inventory.add_product(product_id, name, 10);
        backends
            .store
            .register_product(product_id, name, Some(format!("{name}.png")))
            .await;
        backends.cart.add_line(
            user,
            CartLine::new(product_id, name, Money::from_cents(cents), quantity),
        );
    }
}

async fn wait_for_cart_cleared(backends: &InMemoryBackends, user: UserId) {
    for _ in 0..200 {
        if backends.cart.line_count(user) == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("cart for user {user} was never cleared");
}

fn order_request(user: Value) -> Request<Body> {
    let body = json!({
        "userId": user,
        "shippingAddress": {
            "fullName": "Asha Rao",
            "address": "12 MG Road",
            "city": "Pune",
            "zipCode": "411001",
            "country": "India"
        },
        "paymentMethod": "credit_card"
    });
    Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _) = setup();

    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["service"], "order-service");
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["instance"], "test-1");
}

#[tokio::test]
async fn test_create_order() {
    let (app, backends, _) = setup();
    seed_cart(&backends, USER, &[(1, "Laptop", 65000, 1)]).await;

    let response = app.oneshot(order_request(json!(7))).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Order placed successfully");
    assert_eq!(json["order"]["user_id"], 7);
    assert_eq!(json["order"]["total_amount"], 65000);
    assert_eq!(json["order"]["status"], "processing");
    assert_eq!(json["order"]["payment_method"], "credit_card");
    assert_eq!(json["order"]["payment_reference"], "TXN-1");
    assert_eq!(json["order"]["shipping_address"]["city"], "Pune");
    assert_eq!(json["order"]["shipping_address"]["zipCode"], "411001");

    assert_eq!(backends.store.order_count().await, 1);
    wait_for_cart_cleared(&backends, USER).await;
    assert_eq!(backends.inventory.stock(ProductId::new(1)), Some(9));
}

#[tokio::test]
async fn test_create_order_accepts_string_user_id() {
    let (app, backends, _) = setup();
    seed_cart(&backends, USER, &[(1, "Mouse", 1999, 2)]).await;

    let response = app.oneshot(order_request(json!("7"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["order"]["total_amount"], 3998);
}

#[tokio::test]
async fn test_create_order_with_empty_cart() {
    let (app, backends, _) = setup();

    let response = app.oneshot(order_request(json!(7))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Cart is empty");
    assert_eq!(backends.payment.authorization_count(), 0);
}

#[tokio::test]
async fn test_create_order_with_overflowing_total() {
    let (app, backends, _) = setup();
    seed_cart(&backends, USER, &[(1, "Bulk", 9_999_999_999, 1_000_000_000)]).await;

    let response = app.oneshot(order_request(json!(7))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid cart: Order total is too large");
    assert_eq!(backends.payment.authorization_count(), 0);
}

#[tokio::test]
async fn test_create_order_with_declined_payment() {
    let (app, backends, _) = setup();
    seed_cart(&backends, USER, &[(1, "Laptop", 65000, 1)]).await;
    backends.payment.set_decline(true);

    let response = app.oneshot(order_request(json!(7))).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().starts_with("Payment failed"));
    assert_eq!(backends.store.order_count().await, 0);
    assert_eq!(backends.cart.line_count(USER), 1);
}

#[tokio::test]
async fn test_create_order_with_insufficient_stock() {
    let (app, backends, _) = setup();
    seed_cart(&backends, USER, &[(1, "Laptop", 65000, 11)]).await;

    let response = app.oneshot(order_request(json!(7))).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(backends.payment.authorization_count(), 0);
    assert_eq!(backends.store.order_count().await, 0);
}

#[tokio::test]
async fn test_create_order_with_cart_service_down() {
    let (app, backends, _) = setup();
    backends.cart.set_fail_on_get(true);

    let response = app.oneshot(order_request(json!(7))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(backends.payment.authorization_count(), 0);
}

#[tokio::test]
async fn test_create_order_store_failure_refunds_payment() {
    let (app, backends, _) = setup();
    seed_cart(&backends, USER, &[(1, "Laptop", 65000, 1)]).await;
    backends.store.set_fail_on_insert(true).await;

    let response = app.clone().oneshot(order_request(json!(7))).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(backends.payment.is_refunded("TXN-1"));
    assert_eq!(backends.cart.line_count(USER), 1);
    assert_eq!(backends.inventory.stock(ProductId::new(1)), Some(10));

    let response = app.oneshot(get_request("/reconciliations")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let entries = body_json(response).await;
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["kind"], "payment_without_order");
    assert_eq!(entries[0]["transaction_id"], "TXN-1");
    assert_eq!(entries[0]["refunded"], true);
}

#[tokio::test]
async fn test_create_order_with_malformed_json() {
    let (app, _, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/orders")
                .header("content-type", "application/json")
                .body(Body::from("{ not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_order_with_invalid_user_id() {
    let (app, _, _) = setup();

    let response = app.oneshot(order_request(json!("abc"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_orders_newest_first() {
    let (app, backends, _) = setup();

    seed_cart(&backends, USER, &[(1, "Laptop", 65000, 1)]).await;
    let response = app.clone().oneshot(order_request(json!(7))).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let first_id = body_json(response).await["order"]["id"].clone();
    wait_for_cart_cleared(&backends, USER).await;

    seed_cart(&backends, USER, &[(2, "Mouse", 1999, 2)]).await;
    let response = app.clone().oneshot(order_request(json!(7))).await.unwrap();
    let second_id = body_json(response).await["order"]["id"].clone();
    wait_for_cart_cleared(&backends, USER).await;

    let response = app.clone().oneshot(get_request("/orders/7")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let orders = body_json(response).await;
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["id"], second_id);
    assert_eq!(orders[1]["id"], first_id);
    assert_eq!(orders[1]["items"][0]["name"], "Laptop");
    assert_eq!(orders[1]["items"][0]["image_url"], "Laptop.png");
    assert_eq!(orders[1]["items"][0]["price"], 65000);

    let response = app.oneshot(get_request("/orders/8")).await.unwrap();
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_list_orders_with_invalid_user_id() {
    let (app, _, _) = setup();

    let response = app.oneshot(get_request("/orders/not-a-number")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_order_detail() {
    let (app, backends, _) = setup();
    seed_cart(&backends, USER, &[(1, "Laptop", 65000, 1), (2, "Mouse", 1999, 3)]).await;

    let response = app.clone().oneshot(order_request(json!(7))).await.unwrap();
    let id = body_json(response).await["order"]["id"].clone();

    let response = app
        .oneshot(get_request(&format!("/orders/detail/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], id);
    assert_eq!(json["total_amount"], 70997);
    assert_eq!(json["items"].as_array().unwrap().len(), 2);
    assert_eq!(json["items"][1]["quantity"], 3);
}

#[tokio::test]
async fn test_get_missing_order() {
    let (app, _, _) = setup();

    let response = app.oneshot(get_request("/orders/detail/999")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Order not found");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, backends, _) = setup();
    seed_cart(&backends, USER, &[(1, "Laptop", 65000, 1)]).await;

    let response = app.clone().oneshot(order_request(json!(7))).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.oneshot(get_request("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("checkout_attempts_total"));
}

#[tokio::test]
async fn test_shutdown_drain_finishes_fulfillment() {
    let (app, backends, state) = setup();
    seed_cart(&backends, USER, &[(1, "Laptop", 65000, 1)]).await;

    let response = app.oneshot(order_request(json!(7))).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let cancelled = state
        .coordinator
        .drain_fulfillment(Duration::from_secs(5))
        .await;

    assert_eq!(cancelled, 0);
    assert_eq!(backends.cart.line_count(USER), 0);
    assert_eq!(backends.inventory.stock(ProductId::new(1)), Some(9));
}
