//! Order placement and lookup endpoints.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, UserId};
use domain::{Order, OrderDetails, PaymentMethod, ShippingAddress};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

/// An identifier sent either as a JSON number or as a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IdInput {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: IdInput,
    #[serde(default)]
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderPlacedResponse {
    pub order: Order,
    pub message: &'static str,
}

fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what}: {raw}")))
}

fn user_id_from(input: &IdInput) -> Result<UserId, ApiError> {
    match input {
        IdInput::Number(id) => Ok(UserId::new(*id)),
        IdInput::Text(raw) => parse_id(raw, "userId"),
    }
}

// -- Handlers --

/// POST /orders — place an order for everything in the user's cart.
#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let user_id = user_id_from(&req.user_id)?;

    // The saga runs on its own task so a client disconnect cannot stop it
    // between payment and order commit.
    let coordinator = state.coordinator.clone();
    let placed = tokio::spawn(async move {
        coordinator
            .create_order(user_id, req.shipping_address, req.payment_method)
            .await
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Checkout task failed: {e}")))??;

    Ok((
        StatusCode::CREATED,
        Json(OrderPlacedResponse {
            order: placed.order,
            message: placed.message,
        }),
    ))
}

/// GET /orders/{user_id} — a user's orders with their items, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<OrderDetails>>, ApiError> {
    let user_id: UserId = parse_id(&user_id, "user id")?;
    Ok(Json(state.query.list_orders_for_user(user_id).await?))
}

/// GET /orders/detail/{order_id} — one order with its items.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDetails>, ApiError> {
    let order_id: OrderId = parse_id(&order_id, "order id")?;
    Ok(Json(state.query.get_order(order_id).await?))
}
