use crate::domain::ports::{TransactionStore, WalletStore};
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::domain::wallet::Wallet;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Column family for wallet states.
pub const CF_WALLETS: &str = "wallets";
/// Column family for transaction records.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column family enforcing reference uniqueness (reference -> transaction id).
pub const CF_REFERENCES: &str = "references";

/// A persistent store implementation using RocksDB.
///
/// Values are JSON-encoded. Check-and-set operations (versioned wallet
/// updates, status transitions, reference uniqueness) are serialized through
/// a write guard: RocksDB gives atomic puts but not conditional writes, and
/// the guard turns read-check-write into one critical section per process.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_guard: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_WALLETS, Options::default()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_REFERENCES, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_guard: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("Column family {name} not found")))
    }

    fn put_json<T: serde::Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)
            .map_err(|e| LedgerError::Storage(format!("Serialization error: {e}")))?;
        self.db
            .put_cf(cf, key, bytes)
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        let bytes = self
            .db
            .get_cf(cf, key)
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        match bytes {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| LedgerError::Storage(format!("Deserialization error: {e}"))),
            None => Ok(None),
        }
    }

    fn scan<T, F>(&self, cf_name: &str, mut keep: F) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
        F: FnMut(&T) -> bool,
    {
        let cf = self.cf(cf_name)?;
        let mut items = Vec::new();
        for entry in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = entry.map_err(|e| LedgerError::Storage(e.to_string()))?;
            let item: T = serde_json::from_slice(&value)
                .map_err(|e| LedgerError::Storage(format!("Deserialization error: {e}")))?;
            if keep(&item) {
                items.push(item);
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl WalletStore for RocksDbStore {
    async fn insert(&self, wallet: Wallet) -> Result<()> {
        self.put_json(CF_WALLETS, wallet.id.as_bytes(), &wallet)
    }

    async fn get(&self, wallet_id: Uuid) -> Result<Option<Wallet>> {
        self.get_json(CF_WALLETS, wallet_id.as_bytes())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Wallet>> {
        self.scan(CF_WALLETS, |w: &Wallet| w.owner_id == owner_id && w.active)
    }

    async fn update_versioned(&self, wallet: Wallet, expected_version: u64) -> Result<()> {
        let _guard = self.write_guard.lock().expect("write guard poisoned");
        let current: Wallet = self
            .get_json(CF_WALLETS, wallet.id.as_bytes())?
            .ok_or_else(|| LedgerError::NotFound(format!("Wallet {}", wallet.id)))?;
        if current.version != expected_version {
            return Err(LedgerError::ConcurrencyConflict(wallet.id));
        }
        self.put_json(CF_WALLETS, wallet.id.as_bytes(), &wallet)
    }
}

#[async_trait]
impl TransactionStore for RocksDbStore {
    async fn insert(&self, tx: Transaction) -> Result<()> {
        let _guard = self.write_guard.lock().expect("write guard poisoned");
        let existing: Option<Uuid> = self.get_json(CF_REFERENCES, tx.reference.as_bytes())?;
        if existing.is_some() {
            return Err(LedgerError::DuplicateReference(tx.reference));
        }
        self.put_json(CF_REFERENCES, tx.reference.as_bytes(), &tx.id)?;
        self.put_json(CF_TRANSACTIONS, tx.id.as_bytes(), &tx)
    }

    async fn get(&self, tx_id: Uuid) -> Result<Option<Transaction>> {
        self.get_json(CF_TRANSACTIONS, tx_id.as_bytes())
    }

    async fn transition(
        &self,
        tx_id: Uuid,
        status: TransactionStatus,
        failure_reason: Option<String>,
    ) -> Result<Transaction> {
        let _guard = self.write_guard.lock().expect("write guard poisoned");
        let mut tx: Transaction = self
            .get_json(CF_TRANSACTIONS, tx_id.as_bytes())?
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {tx_id}")))?;
        tx.transition(status, failure_reason)?;
        self.put_json(CF_TRANSACTIONS, tx_id.as_bytes(), &tx)?;
        Ok(tx)
    }

    async fn list_by_wallet(&self, wallet_id: Uuid) -> Result<Vec<Transaction>> {
        let mut matches = self.scan(CF_TRANSACTIONS, |tx: &Transaction| {
            tx.source_wallet_id == wallet_id || tx.destination_wallet_id == Some(wallet_id)
        })?;
        matches.sort_by(|a: &Transaction, b: &Transaction| {
            b.transaction_date.cmp(&a.transaction_date)
        });
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::wallet::{Amount, Balance, WalletKind};
    use rust_decimal_macros::dec;

    fn wallet() -> Wallet {
        Wallet::new(
            Uuid::new_v4(),
            "Main".to_string(),
            "USD".to_string(),
            Balance::new(dec!(100.0)),
            WalletKind::Checking,
        )
    }

    #[tokio::test]
    async fn test_wallet_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let w = wallet();
        {
            let store = RocksDbStore::open(dir.path()).unwrap();
            WalletStore::insert(&store, w.clone()).await.unwrap();
        }
        let store = RocksDbStore::open(dir.path()).unwrap();
        let loaded = WalletStore::get(&store, w.id).await.unwrap().unwrap();
        assert_eq!(loaded, w);
    }

    #[tokio::test]
    async fn test_versioned_update_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        let w = wallet();
        WalletStore::insert(&store, w.clone()).await.unwrap();

        let mut updated = w.clone();
        updated.debit(Amount::new(dec!(10.0)).unwrap()).unwrap();
        store.update_versioned(updated, w.version).await.unwrap();

        let mut stale = w.clone();
        stale.debit(Amount::new(dec!(20.0)).unwrap()).unwrap();
        let err = store.update_versioned(stale, w.version).await;
        assert!(matches!(err, Err(LedgerError::ConcurrencyConflict(_))));
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();

        let request = crate::domain::transaction::CreateTransactionRequest {
            source_wallet_id: Uuid::new_v4(),
            destination_wallet_id: None,
            amount: dec!(5.0),
            currency: "USD".to_string(),
            kind: crate::domain::transaction::TransactionType::Deposit,
            description: None,
        };
        let tx = Transaction::from_request(&request, Amount::new(dec!(5.0)).unwrap());
        let mut copy = tx.clone();
        copy.id = Uuid::new_v4();

        TransactionStore::insert(&store, tx).await.unwrap();
        let err = TransactionStore::insert(&store, copy).await;
        assert!(matches!(err, Err(LedgerError::DuplicateReference(_))));
    }
}
