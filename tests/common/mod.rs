#![allow(dead_code)]

use finledger::application::ledger::{CreateWalletRequest, WalletLedger};
use finledger::application::orchestrator::TransactionOrchestrator;
use finledger::domain::transaction::{CreateTransactionRequest, TransactionType};
use finledger::domain::wallet::WalletKind;
use finledger::infrastructure::event_bus::EventBus;
use finledger::infrastructure::in_memory::{InMemoryTransactionStore, InMemoryWalletStore};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// A fully wired in-memory application, without consumers attached. Tests
/// drive the asynchronous half of the protocol explicitly or spawn the
/// consumers they need.
pub struct TestApp {
    pub ledger: WalletLedger,
    pub orchestrator: TransactionOrchestrator,
    pub bus: Arc<EventBus>,
}

pub fn test_app() -> TestApp {
    let bus = Arc::new(EventBus::new());
    let ledger = WalletLedger::new(Arc::new(InMemoryWalletStore::new()));
    let orchestrator = TransactionOrchestrator::new(
        Arc::new(InMemoryTransactionStore::new()),
        ledger.clone(),
        bus.clone(),
    );
    TestApp {
        ledger,
        orchestrator,
        bus,
    }
}

pub async fn open_wallet(app: &TestApp, balance: Decimal) -> Uuid {
    app.ledger
        .create_wallet(CreateWalletRequest {
            owner_id: Uuid::new_v4(),
            name: "Main".to_string(),
            currency: "USD".to_string(),
            initial_balance: balance,
            kind: WalletKind::Checking,
        })
        .await
        .unwrap()
        .id
}

pub fn transfer(source: Uuid, destination: Uuid, amount: Decimal) -> CreateTransactionRequest {
    CreateTransactionRequest {
        source_wallet_id: source,
        destination_wallet_id: Some(destination),
        amount,
        currency: "USD".to_string(),
        kind: TransactionType::Transfer,
        description: None,
    }
}

pub fn withdrawal(source: Uuid, amount: Decimal) -> CreateTransactionRequest {
    CreateTransactionRequest {
        source_wallet_id: source,
        destination_wallet_id: None,
        amount,
        currency: "USD".to_string(),
        kind: TransactionType::Withdrawal,
        description: None,
    }
}
