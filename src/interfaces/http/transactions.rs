use super::{ApiError, AppState};
use crate::domain::transaction::{CreateTransactionRequest, Transaction};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

/// Creates and synchronously processes a transaction attempt. The response
/// carries the terminal status; failure is in the body, not the HTTP status.
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tx = state.orchestrator.create_transaction(request).await?;
    Ok((StatusCode::CREATED, Json(tx)))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(state.orchestrator.transaction(id).await?))
}

pub async fn list_for_wallet(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(
        state.orchestrator.transactions_for_wallet(wallet_id).await?,
    ))
}
