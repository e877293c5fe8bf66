use super::{ApiError, AppState};
use crate::application::ledger::CreateWalletRequest;
use crate::domain::wallet::{Amount, Wallet};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct MutationBody {
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub wallet_id: Uuid,
    pub balance: Decimal,
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateWalletRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let wallet = state.ledger.create_wallet(request).await?;
    Ok((StatusCode::CREATED, Json(wallet)))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Wallet>, ApiError> {
    Ok(Json(state.ledger.wallet(id).await?))
}

pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Wallet>>, ApiError> {
    Ok(Json(state.ledger.wallets_for_owner(user_id).await?))
}

pub async fn debit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MutationBody>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let amount = Amount::new(body.amount)?;
    let balance = state.ledger.debit(id, amount).await?;
    Ok(Json(BalanceResponse {
        wallet_id: id,
        balance: balance.value(),
    }))
}

pub async fn credit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MutationBody>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let amount = Amount::new(body.amount)?;
    let balance = state.ledger.credit(id, amount).await?;
    Ok(Json(BalanceResponse {
        wallet_id: id,
        balance: balance.value(),
    }))
}

pub async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Wallet>, ApiError> {
    Ok(Json(state.ledger.deactivate(id).await?))
}
