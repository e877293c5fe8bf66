//! Wire events and broker topology.
//!
//! Events are immutable value records emitted once per status transition and
//! delivered at-least-once: consumers must tolerate duplicates and reordering.
//! Field sets are additive-only for compatibility; JSON uses camelCase names.

use crate::domain::transaction::TransactionType;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Exchanges
pub const TRANSACTION_EXCHANGE: &str = "transaction.events";
pub const CATEGORIZATION_EXCHANGE: &str = "categorization.events";

// Queues
pub const TRANSACTION_COMPLETED_QUEUE: &str = "transaction.completed.queue";
pub const TRANSACTION_FAILED_QUEUE: &str = "transaction.failed.queue";
pub const TRANSACTION_CATEGORIZATION_QUEUE: &str = "transaction.categorization.queue";
pub const TRANSACTION_CATEGORIZED_QUEUE: &str = "transaction.categorized.queue";
pub const CREDIT_FAILED_QUEUE: &str = "transaction.credit_failed.queue";

// Routing keys
pub const TRANSACTION_COMPLETED_KEY: &str = "transaction.completed";
pub const TRANSACTION_FAILED_KEY: &str = "transaction.failed";
pub const TRANSACTION_CATEGORIZED_KEY: &str = "transaction.categorized";
pub const CREDIT_FAILED_KEY: &str = "transaction.credit_failed";

// Dead-letter targets
pub const TRANSACTION_DLQ: &str = "transaction.dlq";
pub const CATEGORIZATION_DLQ: &str = "categorization.dlq";

/// Event kinds, used with a transaction id as the idempotency key for
/// at-least-once consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Completed,
    Failed,
    Categorized,
    CreditFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCompleted {
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub source_wallet_id: Uuid,
    pub destination_wallet_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_type: TransactionType,
    pub description: Option<String>,
    pub reference: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFailed {
    pub transaction_id: Uuid,
    /// Absent when the failure happened before the owner lookup resolved.
    pub user_id: Option<Uuid>,
    pub source_wallet_id: Uuid,
    pub destination_wallet_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_type: TransactionType,
    pub description: Option<String>,
    pub failure_reason: String,
    pub error_code: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCategorized {
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub category: String,
    pub sub_category: String,
    /// In [0, 1].
    pub confidence_score: f64,
    pub categorization_method: CategorizationMethod,
    pub categorized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategorizationMethod {
    RuleBased,
    MlBased,
    Manual,
}

/// Emitted by the wallet credit consumer when applying the destination
/// credit fails. Triggers the compensating debit reversal on the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditFailed {
    pub transaction_id: Uuid,
    pub source_wallet_id: Uuid,
    pub destination_wallet_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}
