//! End-to-end orchestration: synchronous debit, asynchronous destination
//! credit, compensation on credit failure, and dead-lettering.

mod common;

use common::{open_wallet, test_app, transfer};
use finledger::application::orchestrator::WalletCreditConsumer;
use chrono::Utc;
use finledger::domain::events::{
    CREDIT_FAILED_KEY, CREDIT_FAILED_QUEUE, CreditFailed, TRANSACTION_COMPLETED_KEY,
    TRANSACTION_COMPLETED_QUEUE, TRANSACTION_DLQ, TRANSACTION_EXCHANGE,
};
use finledger::domain::transaction::TransactionStatus;
use finledger::domain::wallet::Balance;
use finledger::error::LedgerError;
use finledger::infrastructure::event_bus::{QueueBinding, deliver, spawn_consumer};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

fn completed_binding(queue: &str) -> QueueBinding {
    QueueBinding::new(
        TRANSACTION_EXCHANGE,
        queue,
        TRANSACTION_COMPLETED_KEY,
        TRANSACTION_DLQ,
    )
}

#[tokio::test]
async fn test_transfer_debits_source_before_credit_arrives() {
    let app = test_app();
    let source = open_wallet(&app, dec!(100.00)).await;
    let destination = open_wallet(&app, dec!(30.00)).await;
    let consumer = WalletCreditConsumer::new(app.ledger.clone(), app.bus.clone());
    let mut completed = app.bus.subscribe(completed_binding(TRANSACTION_COMPLETED_QUEUE));

    let tx = app
        .orchestrator
        .create_transaction(transfer(source, destination, dec!(20.00)))
        .await
        .unwrap();

    // The synchronous attempt only debits: the eventual-consistency window
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(
        app.ledger.wallet(source).await.unwrap().balance,
        Balance::new(dec!(80.00))
    );
    assert_eq!(
        app.ledger.wallet(destination).await.unwrap().balance,
        Balance::new(dec!(30.00))
    );

    let envelope = completed.try_recv().unwrap();
    consumer.handle_completed(envelope).await.unwrap();
    assert_eq!(
        app.ledger.wallet(destination).await.unwrap().balance,
        Balance::new(dec!(50.00))
    );
}

#[tokio::test]
async fn test_event_observed_only_after_terminal_status_stored() {
    let app = test_app();
    let source = open_wallet(&app, dec!(100.00)).await;
    let destination = open_wallet(&app, dec!(0.00)).await;
    let mut completed = app.bus.subscribe(completed_binding("ordering.probe.queue"));

    let tx = app
        .orchestrator
        .create_transaction(transfer(source, destination, dec!(10.00)))
        .await
        .unwrap();

    assert!(completed.try_recv().is_some());
    // When the event is receivable, the store already reports the terminal state
    let stored = app.orchestrator.transaction(tx.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn test_duplicate_completed_delivery_credits_once() {
    let app = test_app();
    let source = open_wallet(&app, dec!(100.00)).await;
    let destination = open_wallet(&app, dec!(0.00)).await;
    let consumer = WalletCreditConsumer::new(app.ledger.clone(), app.bus.clone());
    let mut completed = app.bus.subscribe(completed_binding(TRANSACTION_COMPLETED_QUEUE));

    app.orchestrator
        .create_transaction(transfer(source, destination, dec!(25.00)))
        .await
        .unwrap();

    let envelope = completed.try_recv().unwrap();
    consumer.handle_completed(envelope.clone()).await.unwrap();
    consumer.handle_completed(envelope).await.unwrap();

    assert_eq!(
        app.ledger.wallet(destination).await.unwrap().balance,
        Balance::new(dec!(25.00))
    );
}

#[tokio::test]
async fn test_failed_credit_compensates_source_debit() {
    let app = test_app();
    let source = open_wallet(&app, dec!(100.00)).await;
    let missing_destination = Uuid::new_v4();
    let consumer = WalletCreditConsumer::new(app.ledger.clone(), app.bus.clone());
    let mut completed = app.bus.subscribe(completed_binding(TRANSACTION_COMPLETED_QUEUE));
    let mut credit_failed = app.bus.subscribe(QueueBinding::new(
        TRANSACTION_EXCHANGE,
        CREDIT_FAILED_QUEUE,
        CREDIT_FAILED_KEY,
        TRANSACTION_DLQ,
    ));

    let tx = app
        .orchestrator
        .create_transaction(transfer(source, missing_destination, dec!(40.00)))
        .await
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(
        app.ledger.wallet(source).await.unwrap().balance,
        Balance::new(dec!(60.00))
    );

    // Credit fails against the unknown destination and requests compensation
    consumer
        .handle_completed(completed.try_recv().unwrap())
        .await
        .unwrap();
    let envelope = credit_failed.try_recv().unwrap();
    app.orchestrator.handle_credit_failed(envelope).await.unwrap();

    assert_eq!(
        app.ledger.wallet(source).await.unwrap().balance,
        Balance::new(dec!(100.00))
    );
    let stored = app.orchestrator.transaction(tx.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Compensated);
    assert!(stored
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("Destination credit failed"));
}

#[tokio::test]
async fn test_duplicate_compensation_reverses_once() {
    let app = test_app();
    let source = open_wallet(&app, dec!(100.00)).await;
    let consumer = WalletCreditConsumer::new(app.ledger.clone(), app.bus.clone());
    let mut completed = app.bus.subscribe(completed_binding(TRANSACTION_COMPLETED_QUEUE));
    let mut credit_failed = app.bus.subscribe(QueueBinding::new(
        TRANSACTION_EXCHANGE,
        CREDIT_FAILED_QUEUE,
        CREDIT_FAILED_KEY,
        TRANSACTION_DLQ,
    ));

    app.orchestrator
        .create_transaction(transfer(source, Uuid::new_v4(), dec!(40.00)))
        .await
        .unwrap();
    consumer
        .handle_completed(completed.try_recv().unwrap())
        .await
        .unwrap();

    let envelope = credit_failed.try_recv().unwrap();
    app.orchestrator
        .handle_credit_failed(envelope.clone())
        .await
        .unwrap();
    app.orchestrator.handle_credit_failed(envelope).await.unwrap();

    assert_eq!(
        app.ledger.wallet(source).await.unwrap().balance,
        Balance::new(dec!(100.00))
    );
}

#[tokio::test]
async fn test_spawned_consumer_applies_credit_end_to_end() {
    let app = test_app();
    let source = open_wallet(&app, dec!(100.00)).await;
    let destination = open_wallet(&app, dec!(0.00)).await;

    let consumer = WalletCreditConsumer::new(app.ledger.clone(), app.bus.clone());
    let handle = spawn_consumer(
        app.bus.clone(),
        completed_binding(TRANSACTION_COMPLETED_QUEUE),
        3,
        move |envelope| {
            let consumer = consumer.clone();
            async move { consumer.handle_completed(envelope).await }
        },
    );

    app.orchestrator
        .create_transaction(transfer(source, destination, dec!(15.00)))
        .await
        .unwrap();

    // Poll until the consumer catches up
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if app.ledger.wallet(destination).await.unwrap().balance == Balance::new(dec!(15.00)) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "credit never applied");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.abort();
}

#[tokio::test]
async fn test_failing_compensation_retries_then_dead_letters() {
    let app = test_app();
    let source = open_wallet(&app, dec!(60.00)).await;
    let mut credit_failed = app.bus.subscribe(QueueBinding::new(
        TRANSACTION_EXCHANGE,
        CREDIT_FAILED_QUEUE,
        CREDIT_FAILED_KEY,
        TRANSACTION_DLQ,
    ));

    // References a transaction the store does not know, so every attempt fails
    let event = CreditFailed {
        transaction_id: Uuid::new_v4(),
        source_wallet_id: source,
        destination_wallet_id: Uuid::new_v4(),
        amount: dec!(40.00),
        currency: "USD".to_string(),
        reason: "destination wallet gone".to_string(),
        failed_at: Utc::now(),
    };
    app.bus
        .publish(TRANSACTION_EXCHANGE, CREDIT_FAILED_KEY, &event)
        .unwrap();
    let envelope = credit_failed.try_recv().unwrap();

    let attempts = Arc::new(AtomicU64::new(0));
    let counter = attempts.clone();
    let orchestrator = app.orchestrator.clone();
    let handler = move |envelope| {
        counter.fetch_add(1, Ordering::SeqCst);
        let orchestrator = orchestrator.clone();
        async move { orchestrator.handle_credit_failed(envelope).await }
    };
    deliver(&app.bus, credit_failed.binding(), 3, &handler, envelope).await;

    // A failed attempt must not count as handled: every retry re-executes
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    let dead = app.bus.dead_letters(TRANSACTION_DLQ);
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].queue, CREDIT_FAILED_QUEUE);
    // No partial compensation leaked into the ledger
    assert_eq!(
        app.ledger.wallet(source).await.unwrap().balance,
        Balance::new(dec!(60.00))
    );
}

#[tokio::test]
async fn test_poisoned_message_lands_in_dead_letter_queue() {
    let app = test_app();
    let binding = completed_binding(TRANSACTION_COMPLETED_QUEUE);

    let handle = spawn_consumer(app.bus.clone(), binding, 3, move |_| async move {
        Err(LedgerError::Delivery("schema mismatch".to_string()))
    });

    app.bus
        .publish(
            TRANSACTION_EXCHANGE,
            TRANSACTION_COMPLETED_KEY,
            &serde_json::json!({"not": "a transaction event"}),
        )
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let dead = app.bus.dead_letters(TRANSACTION_DLQ);
        if !dead.is_empty() {
            assert_eq!(dead[0].queue, TRANSACTION_COMPLETED_QUEUE);
            assert!(dead[0].reason.contains("schema mismatch"));
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "message never dead-lettered");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.abort();
}
