//! REST surface over the ledger and orchestrator.
//!
//! Transaction failure is reported through the resource's own `status` and
//! `failure_reason` fields, not as an HTTP error: creation itself succeeded.

use crate::application::ledger::WalletLedger;
use crate::application::orchestrator::TransactionOrchestrator;
use crate::error::LedgerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

pub mod transactions;
pub mod wallets;

#[derive(Clone)]
pub struct AppState {
    pub ledger: WalletLedger,
    pub orchestrator: TransactionOrchestrator,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/wallets", post(wallets::create))
        .route("/wallets/{id}", get(wallets::get_by_id))
        .route("/wallets/{id}/debit", post(wallets::debit))
        .route("/wallets/{id}/credit", post(wallets::credit))
        .route("/wallets/{id}/deactivate", post(wallets::deactivate))
        .route("/users/{user_id}/wallets", get(wallets::list_for_user))
        .route("/transactions", post(transactions::create))
        .route("/transactions/{id}", get(transactions::get_by_id))
        .route(
            "/transactions/wallet/{wallet_id}",
            get(transactions::list_for_wallet),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Maps the domain error taxonomy onto HTTP statuses with a JSON body.
pub struct ApiError(LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            LedgerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            LedgerError::DuplicateReference(_)
            | LedgerError::InvalidTransition { .. }
            | LedgerError::Delivery(_)
            | LedgerError::Storage(_)
            | LedgerError::Csv(_)
            | LedgerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.0.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
