//! The wallet ledger: the only component allowed to mutate balances.
//!
//! Mutations use optimistic concurrency: read `(balance, version)`, compute
//! the new state, write conditioned on the version being unchanged. Conflicts
//! are retried a bounded number of times with jittered backoff before
//! surfacing `ConcurrencyConflict`. The ledger emits no events; that is the
//! orchestrator's responsibility.

use crate::domain::ports::WalletStoreRef;
use crate::domain::wallet::{Amount, Balance, Wallet, WalletKind};
use crate::error::{LedgerError, Result};
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Internal retry budget for version conflicts.
const MAX_CONFLICT_RETRIES: u32 = 3;
/// Jittered backoff window between conflict retries, in milliseconds.
const BACKOFF_MIN_MS: u64 = 10;
const BACKOFF_MAX_MS: u64 = 40;

#[derive(Debug, Deserialize, Clone)]
pub struct CreateWalletRequest {
    pub owner_id: Uuid,
    pub name: String,
    pub currency: String,
    pub initial_balance: rust_decimal::Decimal,
    pub kind: WalletKind,
}

#[derive(Clone)]
pub struct WalletLedger {
    wallets: WalletStoreRef,
}

impl WalletLedger {
    pub fn new(wallets: WalletStoreRef) -> Self {
        Self { wallets }
    }

    pub async fn create_wallet(&self, request: CreateWalletRequest) -> Result<Wallet> {
        if request.currency.len() != 3 {
            return Err(LedgerError::Validation(
                "Currency must be a 3-letter ISO 4217 code".to_string(),
            ));
        }
        if request.initial_balance < rust_decimal::Decimal::ZERO {
            return Err(LedgerError::Validation(
                "Initial balance must not be negative".to_string(),
            ));
        }
        let wallet = Wallet::new(
            request.owner_id,
            request.name,
            request.currency.to_uppercase(),
            Balance::new(request.initial_balance),
            request.kind,
        );
        info!(wallet_id = %wallet.id, owner_id = %wallet.owner_id, "Wallet created");
        self.wallets.insert(wallet.clone()).await?;
        Ok(wallet)
    }

    pub async fn wallet(&self, wallet_id: Uuid) -> Result<Wallet> {
        self.wallets
            .get(wallet_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Wallet {wallet_id}")))
    }

    pub async fn wallets_for_owner(&self, owner_id: Uuid) -> Result<Vec<Wallet>> {
        self.wallets.list_by_owner(owner_id).await
    }

    /// Soft-deactivates a wallet; the record is never deleted.
    pub async fn deactivate(&self, wallet_id: Uuid) -> Result<Wallet> {
        self.mutate(wallet_id, "deactivate", |wallet| {
            wallet.deactivate();
            Ok(())
        })
        .await
    }

    /// Debits `amount` from the wallet.
    ///
    /// Fails with `NotFound`, `InsufficientFunds`, or `ConcurrencyConflict`
    /// once the internal retry budget is exhausted.
    pub async fn debit(&self, wallet_id: Uuid, amount: Amount) -> Result<Balance> {
        let wallet = self
            .mutate(wallet_id, "debit", |wallet| wallet.debit(amount))
            .await?;
        info!(
            %wallet_id,
            amount = %amount.value(),
            new_balance = %wallet.balance,
            "Wallet debited"
        );
        Ok(wallet.balance)
    }

    /// Credits `amount` to the wallet. Deposits are unbounded by design.
    pub async fn credit(&self, wallet_id: Uuid, amount: Amount) -> Result<Balance> {
        let wallet = self
            .mutate(wallet_id, "credit", |wallet| {
                wallet.credit(amount);
                Ok(())
            })
            .await?;
        info!(
            %wallet_id,
            amount = %amount.value(),
            new_balance = %wallet.balance,
            "Wallet credited"
        );
        Ok(wallet.balance)
    }

    /// Read-mutate-write with a version-conditioned store and bounded
    /// conflict retries. Business failures from `apply` abort immediately;
    /// only `ConcurrencyConflict` re-reads and retries.
    async fn mutate<F>(&self, wallet_id: Uuid, op: &str, apply: F) -> Result<Wallet>
    where
        F: Fn(&mut Wallet) -> Result<()>,
    {
        let mut attempt = 0;
        loop {
            let mut wallet = self.wallet(wallet_id).await?;
            let read_version = wallet.version;
            apply(&mut wallet)?;

            match self
                .wallets
                .update_versioned(wallet.clone(), read_version)
                .await
            {
                Ok(()) => return Ok(wallet),
                Err(LedgerError::ConcurrencyConflict(_)) => {
                    attempt += 1;
                    if attempt >= MAX_CONFLICT_RETRIES {
                        warn!(%wallet_id, op, attempt, "Version conflict retries exhausted");
                        return Err(LedgerError::ConcurrencyConflict(wallet_id));
                    }
                    let backoff = {
                        let mut rng = rand::thread_rng();
                        Duration::from_millis(rng.gen_range(BACKOFF_MIN_MS..BACKOFF_MAX_MS))
                    };
                    debug!(%wallet_id, op, attempt, ?backoff, "Version conflict, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
