use crate::domain::ports::{TransactionStore, WalletStore};
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::domain::wallet::Wallet;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory store for wallets.
///
/// Uses `Arc<RwLock<HashMap<Uuid, Wallet>>>` for shared concurrent access.
/// The version check in `update_versioned` happens under the write lock, so
/// it is a true compare-and-swap from the caller's point of view.
#[derive(Default, Clone)]
pub struct InMemoryWalletStore {
    wallets: Arc<RwLock<HashMap<Uuid, Wallet>>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn insert(&self, wallet: Wallet) -> Result<()> {
        let mut wallets = self.wallets.write().await;
        wallets.insert(wallet.id, wallet);
        Ok(())
    }

    async fn get(&self, wallet_id: Uuid) -> Result<Option<Wallet>> {
        let wallets = self.wallets.read().await;
        Ok(wallets.get(&wallet_id).cloned())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Wallet>> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .values()
            .filter(|w| w.owner_id == owner_id && w.active)
            .cloned()
            .collect())
    }

    async fn update_versioned(&self, wallet: Wallet, expected_version: u64) -> Result<()> {
        let mut wallets = self.wallets.write().await;
        let current = wallets
            .get(&wallet.id)
            .ok_or_else(|| LedgerError::NotFound(format!("Wallet {}", wallet.id)))?;
        if current.version != expected_version {
            return Err(LedgerError::ConcurrencyConflict(wallet.id));
        }
        wallets.insert(wallet.id, wallet);
        Ok(())
    }
}

/// A thread-safe in-memory store for transactions.
///
/// Tracks references separately to enforce their uniqueness invariant.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<HashMap<Uuid, Transaction>>>,
    references: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, tx: Transaction) -> Result<()> {
        let mut references = self.references.write().await;
        if !references.insert(tx.reference.clone()) {
            return Err(LedgerError::DuplicateReference(tx.reference));
        }
        let mut transactions = self.transactions.write().await;
        transactions.insert(tx.id, tx);
        Ok(())
    }

    async fn get(&self, tx_id: Uuid) -> Result<Option<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(&tx_id).cloned())
    }

    async fn transition(
        &self,
        tx_id: Uuid,
        status: TransactionStatus,
        failure_reason: Option<String>,
    ) -> Result<Transaction> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .get_mut(&tx_id)
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {tx_id}")))?;
        tx.transition(status, failure_reason)?;
        Ok(tx.clone())
    }

    async fn list_by_wallet(&self, wallet_id: Uuid) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        let mut matches: Vec<Transaction> = transactions
            .values()
            .filter(|tx| {
                tx.source_wallet_id == wallet_id || tx.destination_wallet_id == Some(wallet_id)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));
        Ok(matches)
    }
}
