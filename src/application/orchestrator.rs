//! Transaction orchestration: sequences creation, debit, status transition,
//! and event emission for one transaction attempt, plus the asynchronous
//! completion protocol that applies destination credits and compensation.
//!
//! The synchronous attempt never credits the destination. Crediting happens
//! when the wallet credit consumer receives the `TransactionCompleted` event,
//! so there is an observable eventual-consistency window between the source
//! debit and the destination credit. If the credit fails, a `CreditFailed`
//! event triggers a compensating reversal on the source wallet and the
//! transaction ends `Compensated`.

use crate::application::idempotency::IdempotencyGuard;
use crate::application::ledger::WalletLedger;
use crate::domain::events::{
    CreditFailed, EventKind, TRANSACTION_COMPLETED_KEY, TRANSACTION_EXCHANGE,
    TRANSACTION_FAILED_KEY, CREDIT_FAILED_KEY, TransactionCompleted, TransactionFailed,
};
use crate::domain::ports::TransactionStoreRef;
use crate::domain::transaction::{
    CreateTransactionRequest, Transaction, TransactionStatus,
};
use crate::domain::wallet::Amount;
use crate::error::{LedgerError, Result};
use crate::infrastructure::event_bus::{Envelope, EventBus};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Bound on each remote call within one attempt (owner lookup, debit).
/// Expiry is a definitive failure for the attempt, never a silent wait.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct TransactionOrchestrator {
    transactions: TransactionStoreRef,
    ledger: WalletLedger,
    bus: Arc<EventBus>,
    guard: Arc<IdempotencyGuard>,
    call_timeout: Duration,
}

impl TransactionOrchestrator {
    pub fn new(
        transactions: TransactionStoreRef,
        ledger: WalletLedger,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            transactions,
            ledger,
            bus,
            guard: Arc::new(IdempotencyGuard::new()),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Runs one transaction attempt end to end and returns the record in its
    /// terminal state.
    ///
    /// The persisted status is authoritative: callers read failure from the
    /// transaction's `status`/`failure_reason`, not from this method's error,
    /// which is reserved for creation itself failing.
    pub async fn create_transaction(
        &self,
        request: CreateTransactionRequest,
    ) -> Result<Transaction> {
        if request.currency.len() != 3 {
            return Err(LedgerError::Validation(
                "Currency must be a 3-letter ISO 4217 code".to_string(),
            ));
        }
        let amount = Amount::new(request.amount)?;
        let tx = Transaction::from_request(&request, amount);
        info!(
            transaction_id = %tx.id,
            source_wallet_id = %tx.source_wallet_id,
            amount = %request.amount,
            "Transaction created"
        );
        // A reference collision means the id generator is unsound: fatal.
        self.transactions.insert(tx.clone()).await?;
        self.process_attempt(tx).await
    }

    pub async fn transaction(&self, tx_id: Uuid) -> Result<Transaction> {
        self.transactions
            .get(tx_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {tx_id}")))
    }

    pub async fn transactions_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<Transaction>> {
        self.transactions.list_by_wallet(wallet_id).await
    }

    async fn process_attempt(&self, tx: Transaction) -> Result<Transaction> {
        let mut user_id = None;
        let debit_result = match self
            .bounded("wallet lookup", self.ledger.wallet(tx.source_wallet_id))
            .await
        {
            Ok(source_wallet) => {
                user_id = Some(source_wallet.owner_id);
                self.bounded(
                    "debit",
                    self.ledger.debit(tx.source_wallet_id, tx.amount),
                )
                .await
                .map(|_| ())
            }
            Err(e) => Err(e),
        };

        // Store-then-publish: the terminal status is persisted before the
        // matching event goes out, so a consumer never observes an event for
        // a transaction the store still reports as pending.
        match debit_result {
            Ok(()) => {
                let updated = self
                    .transactions
                    .transition(tx.id, TransactionStatus::Completed, None)
                    .await?;
                let user_id =
                    user_id.expect("owner id resolved before a successful debit");
                self.publish_best_effort(
                    TRANSACTION_COMPLETED_KEY,
                    &TransactionCompleted {
                        transaction_id: tx.id,
                        user_id,
                        source_wallet_id: tx.source_wallet_id,
                        destination_wallet_id: tx.destination_wallet_id,
                        amount: tx.amount.value(),
                        currency: tx.currency.clone(),
                        transaction_type: tx.kind,
                        description: tx.description.clone(),
                        reference: tx.reference.clone(),
                        completed_at: Utc::now(),
                    },
                );
                info!(transaction_id = %tx.id, "Transaction completed");
                Ok(updated)
            }
            Err(e) => {
                let reason = e.to_string();
                error!(transaction_id = %tx.id, error = %reason, "Transaction failed");
                let updated = self
                    .transactions
                    .transition(tx.id, TransactionStatus::Failed, Some(reason.clone()))
                    .await?;
                self.publish_best_effort(
                    TRANSACTION_FAILED_KEY,
                    &TransactionFailed {
                        transaction_id: tx.id,
                        user_id,
                        source_wallet_id: tx.source_wallet_id,
                        destination_wallet_id: tx.destination_wallet_id,
                        amount: tx.amount.value(),
                        currency: tx.currency.clone(),
                        transaction_type: tx.kind,
                        description: tx.description.clone(),
                        failure_reason: reason,
                        error_code: e.code().to_string(),
                        failed_at: Utc::now(),
                    },
                );
                Ok(updated)
            }
        }
    }

    /// Compensation consumer: reverses the source debit after a failed
    /// destination credit and marks the transaction `Compensated`.
    ///
    /// The idempotency key is marked only once the reversal completed, so a
    /// failing attempt stays visible to the harness retry and dead-letter
    /// path. The status transition comes first and tolerates redelivery; the
    /// non-idempotent credit is the last step before the key is marked.
    pub async fn handle_credit_failed(&self, envelope: Envelope) -> Result<()> {
        let event: CreditFailed = envelope.decode()?;
        if self.guard.seen(event.transaction_id, EventKind::CreditFailed) {
            debug!(transaction_id = %event.transaction_id, "Duplicate credit-failed event ignored");
            return Ok(());
        }
        let amount = Amount::new(event.amount)?;
        match self
            .transactions
            .transition(
                event.transaction_id,
                TransactionStatus::Compensated,
                Some(format!("Destination credit failed: {}", event.reason)),
            )
            .await
        {
            Ok(_) => {}
            // Redelivery after the credit step failed on an earlier attempt
            Err(LedgerError::InvalidTransition {
                from: TransactionStatus::Compensated,
                ..
            }) => {}
            Err(e) => return Err(e),
        }
        self.ledger.credit(event.source_wallet_id, amount).await?;
        self.guard.mark(event.transaction_id, EventKind::CreditFailed);
        info!(
            transaction_id = %event.transaction_id,
            source_wallet_id = %event.source_wallet_id,
            "Debit reversed, transaction compensated"
        );
        Ok(())
    }

    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(format!(
                "{op} exceeded {:?}",
                self.call_timeout
            ))),
        }
    }

    /// Publish is best-effort: a broker failure is logged and not retried;
    /// the persisted transaction status remains authoritative.
    fn publish_best_effort<T: Serialize>(&self, routing_key: &str, event: &T) {
        if let Err(e) = self.bus.publish(TRANSACTION_EXCHANGE, routing_key, event) {
            warn!(routing_key, error = %e, "Event publish failed, not retried");
        }
    }
}

/// Wallet-side consumer of the completion protocol: applies the destination
/// credit for completed transfers.
#[derive(Clone)]
pub struct WalletCreditConsumer {
    ledger: WalletLedger,
    bus: Arc<EventBus>,
    guard: Arc<IdempotencyGuard>,
}

impl WalletCreditConsumer {
    pub fn new(ledger: WalletLedger, bus: Arc<EventBus>) -> Self {
        Self {
            ledger,
            bus,
            guard: Arc::new(IdempotencyGuard::new()),
        }
    }

    /// Handles a `TransactionCompleted` delivery. Idempotent under duplicate
    /// delivery; the key is marked only once the delivery is fully handled.
    /// A credit failure does not roll back the committed debit; it publishes
    /// `CreditFailed` so the compensation consumer can act.
    pub async fn handle_completed(&self, envelope: Envelope) -> Result<()> {
        let event: TransactionCompleted = envelope.decode()?;
        if self.guard.seen(event.transaction_id, EventKind::Completed) {
            debug!(transaction_id = %event.transaction_id, "Duplicate completed event ignored");
            return Ok(());
        }
        let Some(destination) = event.destination_wallet_id else {
            self.guard.mark(event.transaction_id, EventKind::Completed);
            return Ok(());
        };
        let amount = Amount::new(event.amount)?;
        match self.ledger.credit(destination, amount).await {
            Ok(_) => {
                debug!(
                    transaction_id = %event.transaction_id,
                    destination_wallet_id = %destination,
                    "Destination credited"
                );
            }
            Err(e) => {
                warn!(
                    transaction_id = %event.transaction_id,
                    destination_wallet_id = %destination,
                    error = %e,
                    "Destination credit failed, requesting compensation"
                );
                // A failed publish propagates: the credit was not applied,
                // so redelivery retries the whole handler.
                self.bus.publish(
                    TRANSACTION_EXCHANGE,
                    CREDIT_FAILED_KEY,
                    &CreditFailed {
                        transaction_id: event.transaction_id,
                        source_wallet_id: event.source_wallet_id,
                        destination_wallet_id: destination,
                        amount: event.amount,
                        currency: event.currency.clone(),
                        reason: e.to_string(),
                        failed_at: Utc::now(),
                    },
                )?;
            }
        }
        self.guard.mark(event.transaction_id, EventKind::Completed);
        Ok(())
    }
}
