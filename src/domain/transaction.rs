use crate::domain::wallet::Amount;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Transfer,
    Deposit,
    Withdrawal,
    Payment,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    /// A completed transaction whose destination credit failed and whose
    /// source debit was reversed by the compensation consumer.
    Compensated,
}

impl TransactionStatus {
    /// Status transitions are monotonic: `Pending` resolves exactly once to
    /// `Completed` or `Failed`. The only transition out of a terminal state
    /// is `Completed -> Compensated`, taken by the compensation path.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Pending, TransactionStatus::Failed)
                | (TransactionStatus::Completed, TransactionStatus::Compensated)
        )
    }
}

/// A requested movement of funds and its outcome record.
///
/// Created `Pending` by the orchestrator, mutated exactly once to a terminal
/// state by the same orchestration attempt, and retained indefinitely as an
/// audit record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: Uuid,
    pub source_wallet_id: Uuid,
    /// Absent for deposits and withdrawals.
    pub destination_wallet_id: Option<Uuid>,
    pub amount: Amount,
    pub currency: String,
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub description: Option<String>,
    /// Globally unique idempotency token generated at creation.
    pub reference: String,
    pub failure_reason: Option<String>,
    pub transaction_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for one transaction attempt.
#[derive(Debug, Deserialize, Clone)]
pub struct CreateTransactionRequest {
    pub source_wallet_id: Uuid,
    pub destination_wallet_id: Option<Uuid>,
    pub amount: rust_decimal::Decimal,
    pub currency: String,
    pub kind: TransactionType,
    pub description: Option<String>,
}

impl Transaction {
    pub fn from_request(request: &CreateTransactionRequest, amount: Amount) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source_wallet_id: request.source_wallet_id,
            destination_wallet_id: request.destination_wallet_id,
            amount,
            currency: request.currency.clone(),
            kind: request.kind,
            status: TransactionStatus::Pending,
            description: request.description.clone(),
            reference: Uuid::new_v4().to_string(),
            failure_reason: None,
            transaction_date: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a status transition, enforcing the monotonic state machine.
    pub fn transition(
        &mut self,
        next: TransactionStatus,
        failure_reason: Option<String>,
    ) -> Result<(), LedgerError> {
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if failure_reason.is_some() {
            self.failure_reason = failure_reason;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}
