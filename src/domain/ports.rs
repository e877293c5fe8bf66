use super::transaction::{Transaction, TransactionStatus};
use super::wallet::Wallet;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Shared handles; stores are used concurrently by the ledger, the
/// orchestrator, and the HTTP layer.
pub type WalletStoreRef = Arc<dyn WalletStore>;
pub type TransactionStoreRef = Arc<dyn TransactionStore>;

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn insert(&self, wallet: Wallet) -> Result<()>;

    async fn get(&self, wallet_id: Uuid) -> Result<Option<Wallet>>;

    /// Active wallets owned by `owner_id`.
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Wallet>>;

    /// Conditional write: succeeds only if the stored version still equals
    /// `expected_version`, otherwise fails with `ConcurrencyConflict`.
    ///
    /// This compare-and-swap is the correctness mechanism for concurrent
    /// balance mutation; there are no cross-process locks.
    async fn update_versioned(&self, wallet: Wallet, expected_version: u64) -> Result<()>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persists a new transaction. Fails with `DuplicateReference` if the
    /// reference already exists (treated as fatal, not retried).
    async fn insert(&self, tx: Transaction) -> Result<()>;

    async fn get(&self, tx_id: Uuid) -> Result<Option<Transaction>>;

    /// Applies a status transition atomically and returns the updated record.
    async fn transition(
        &self,
        tx_id: Uuid,
        status: TransactionStatus,
        failure_reason: Option<String>,
    ) -> Result<Transaction>;

    /// Transactions where the wallet is source or destination, de-duplicated,
    /// ordered by `transaction_date` descending. Recomputed each call.
    async fn list_by_wallet(&self, wallet_id: Uuid) -> Result<Vec<Transaction>>;
}
