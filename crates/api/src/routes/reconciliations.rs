//! Reconciliation log endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::ReconciliationEntry;

use crate::AppState;
use crate::error::ApiError;

/// GET /reconciliations — captured payments without an order and failed
/// post-commit side effects, newest first.
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ReconciliationEntry>>, ApiError> {
    Ok(Json(state.query.list_reconciliations().await?))
}
