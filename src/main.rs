use clap::{Parser, Subcommand};
use finledger::application::categorizer::Categorizer;
use finledger::application::ledger::{CreateWalletRequest, WalletLedger};
use finledger::application::orchestrator::{TransactionOrchestrator, WalletCreditConsumer};
use finledger::domain::category::{CategoryRule, default_rules};
use finledger::domain::events::{
    CATEGORIZATION_DLQ, CREDIT_FAILED_KEY, CREDIT_FAILED_QUEUE, TRANSACTION_CATEGORIZATION_QUEUE,
    TRANSACTION_COMPLETED_KEY, TRANSACTION_COMPLETED_QUEUE, TRANSACTION_DLQ, TRANSACTION_EXCHANGE,
};
use finledger::domain::ports::{TransactionStoreRef, WalletStoreRef};
use finledger::domain::transaction::CreateTransactionRequest;
use finledger::domain::wallet::Wallet;
use finledger::error::LedgerError;
use finledger::infrastructure::event_bus::{
    DEFAULT_RETRY_BUDGET, EventBus, QueueBinding, spawn_consumer,
};
use finledger::infrastructure::in_memory::{InMemoryTransactionStore, InMemoryWalletStore};
use finledger::interfaces::csv::rule_reader::RuleReader;
use finledger::interfaces::csv::scenario_reader::{ScenarioOp, ScenarioReader, ScenarioRecord};
use finledger::interfaces::csv::wallet_writer::WalletSummaryWriter;
use finledger::interfaces::http::{AppState, create_app};
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST API with the event consumers attached.
    Serve {
        #[arg(long, default_value_t = 3000)]
        port: u16,

        /// Categorization rules CSV. Compiled-in defaults when omitted.
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Path to persistent database. If provided, uses RocksDB.
        #[cfg(feature = "storage-rocksdb")]
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Run a CSV scenario through the full orchestration and print the
    /// final wallet balances as CSV.
    Simulate {
        /// Input scenario CSV file.
        input: PathBuf,

        /// Categorization rules CSV. Compiled-in defaults when omitted.
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Path to persistent database. If provided, uses RocksDB.
        #[cfg(feature = "storage-rocksdb")]
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
}

struct Stores {
    wallets: WalletStoreRef,
    transactions: TransactionStoreRef,
}

fn in_memory_stores() -> Stores {
    Stores {
        wallets: Arc::new(InMemoryWalletStore::new()),
        transactions: Arc::new(InMemoryTransactionStore::new()),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    use finledger::infrastructure::rocksdb::RocksDbStore;

    match db_path {
        Some(path) => {
            let store = RocksDbStore::open(path).into_diagnostic()?;
            Ok(Stores {
                wallets: Arc::new(store.clone()),
                transactions: Arc::new(store),
            })
        }
        None => Ok(in_memory_stores()),
    }
}

fn load_rules(path: Option<PathBuf>) -> Result<Vec<CategoryRule>> {
    match path {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            RuleReader::new(file).rules().into_diagnostic()
        }
        None => Ok(default_rules()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout is reserved for simulation output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve {
            port,
            rules,
            #[cfg(feature = "storage-rocksdb")]
            db_path,
        } => {
            #[cfg(feature = "storage-rocksdb")]
            let stores = open_stores(db_path)?;
            #[cfg(not(feature = "storage-rocksdb"))]
            let stores = in_memory_stores();
            serve(port, stores, load_rules(rules)?).await
        }
        Command::Simulate {
            input,
            rules,
            #[cfg(feature = "storage-rocksdb")]
            db_path,
        } => {
            #[cfg(feature = "storage-rocksdb")]
            let stores = open_stores(db_path)?;
            #[cfg(not(feature = "storage-rocksdb"))]
            let stores = in_memory_stores();
            simulate(input, stores, load_rules(rules)?).await
        }
    }
}

async fn serve(port: u16, stores: Stores, rules: Vec<CategoryRule>) -> Result<()> {
    let bus = Arc::new(EventBus::new());
    let ledger = WalletLedger::new(stores.wallets);
    let orchestrator = TransactionOrchestrator::new(stores.transactions, ledger.clone(), bus.clone());

    // Each consumer owns its queue; all observe every matching message.
    let credit = WalletCreditConsumer::new(ledger.clone(), bus.clone());
    spawn_consumer(
        bus.clone(),
        QueueBinding::new(
            TRANSACTION_EXCHANGE,
            TRANSACTION_COMPLETED_QUEUE,
            TRANSACTION_COMPLETED_KEY,
            TRANSACTION_DLQ,
        ),
        DEFAULT_RETRY_BUDGET,
        move |envelope| {
            let credit = credit.clone();
            async move { credit.handle_completed(envelope).await }
        },
    );

    let categorizer = Categorizer::with_rules(bus.clone(), rules);
    spawn_consumer(
        bus.clone(),
        QueueBinding::new(
            TRANSACTION_EXCHANGE,
            TRANSACTION_CATEGORIZATION_QUEUE,
            TRANSACTION_COMPLETED_KEY,
            CATEGORIZATION_DLQ,
        ),
        DEFAULT_RETRY_BUDGET,
        move |envelope| {
            let categorizer = categorizer.clone();
            async move { categorizer.handle_completed(envelope).await }
        },
    );

    let compensator = orchestrator.clone();
    spawn_consumer(
        bus.clone(),
        QueueBinding::new(
            TRANSACTION_EXCHANGE,
            CREDIT_FAILED_QUEUE,
            CREDIT_FAILED_KEY,
            TRANSACTION_DLQ,
        ),
        DEFAULT_RETRY_BUDGET,
        move |envelope| {
            let compensator = compensator.clone();
            async move { compensator.handle_credit_failed(envelope).await }
        },
    );

    let app = create_app(AppState {
        ledger,
        orchestrator,
    });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .into_diagnostic()?;
    info!(port, "Listening");
    axum::serve(listener, app).await.into_diagnostic()
}

/// Runs the scenario with events drained synchronously after each row, so
/// credits and categorizations are applied deterministically before the
/// summary is written.
async fn simulate(input: PathBuf, stores: Stores, rules: Vec<CategoryRule>) -> Result<()> {
    let bus = Arc::new(EventBus::new());
    let ledger = WalletLedger::new(stores.wallets);
    let orchestrator = TransactionOrchestrator::new(stores.transactions, ledger.clone(), bus.clone());
    let credit = WalletCreditConsumer::new(ledger.clone(), bus.clone());
    let categorizer = Categorizer::with_rules(bus.clone(), rules);

    let mut completed_sub = bus.subscribe(QueueBinding::new(
        TRANSACTION_EXCHANGE,
        TRANSACTION_COMPLETED_QUEUE,
        TRANSACTION_COMPLETED_KEY,
        TRANSACTION_DLQ,
    ));
    let mut categorization_sub = bus.subscribe(QueueBinding::new(
        TRANSACTION_EXCHANGE,
        TRANSACTION_CATEGORIZATION_QUEUE,
        TRANSACTION_COMPLETED_KEY,
        CATEGORIZATION_DLQ,
    ));
    let mut compensation_sub = bus.subscribe(QueueBinding::new(
        TRANSACTION_EXCHANGE,
        CREDIT_FAILED_QUEUE,
        CREDIT_FAILED_KEY,
        TRANSACTION_DLQ,
    ));

    let owner = Uuid::new_v4();
    let mut labels: HashMap<String, Uuid> = HashMap::new();

    let file = File::open(&input).into_diagnostic()?;
    for record in ScenarioReader::new(file).records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "Skipping malformed scenario row");
                continue;
            }
        };

        match record.op {
            ScenarioOp::Open => {
                let wallet = ledger
                    .create_wallet(CreateWalletRequest {
                        owner_id: owner,
                        name: record.wallet.clone(),
                        currency: record.currency.clone(),
                        initial_balance: record.amount,
                        kind: record.wallet_kind().into_diagnostic()?,
                    })
                    .await
                    .into_diagnostic()?;
                labels.insert(record.wallet.clone(), wallet.id);
            }
            op => {
                let result = run_row(&orchestrator, &labels, &record, op).await;
                if let Err(e) = result {
                    error!(error = %e, wallet = %record.wallet, "Skipping transaction row");
                }
                // Apply the asynchronous half of the protocol now.
                while let Some(envelope) = completed_sub.try_recv() {
                    credit
                        .handle_completed(envelope)
                        .await
                        .into_diagnostic()?;
                }
                while let Some(envelope) = compensation_sub.try_recv() {
                    orchestrator
                        .handle_credit_failed(envelope)
                        .await
                        .into_diagnostic()?;
                }
                while let Some(envelope) = categorization_sub.try_recv() {
                    categorizer
                        .handle_completed(envelope)
                        .await
                        .into_diagnostic()?;
                }
            }
        }
    }

    let mut summary: Vec<(String, Wallet)> = Vec::new();
    for (label, wallet_id) in &labels {
        let wallet = ledger.wallet(*wallet_id).await.into_diagnostic()?;
        summary.push((label.clone(), wallet));
    }

    let stdout = io::stdout();
    WalletSummaryWriter::new(stdout.lock())
        .write_summary(summary)
        .into_diagnostic()?;
    Ok(())
}

async fn run_row(
    orchestrator: &TransactionOrchestrator,
    labels: &HashMap<String, Uuid>,
    record: &ScenarioRecord,
    op: ScenarioOp,
) -> finledger::error::Result<()> {
    let source = *labels
        .get(&record.wallet)
        .ok_or_else(|| LedgerError::Validation(format!("Unknown wallet label: {}", record.wallet)))?;
    let destination = match record.destination.as_deref() {
        None | Some("") => None,
        Some(label) => Some(*labels.get(label).ok_or_else(|| {
            LedgerError::Validation(format!("Unknown wallet label: {label}"))
        })?),
    };
    let kind = op
        .transaction_type()
        .ok_or_else(|| LedgerError::Validation("Not a transaction row".to_string()))?;

    orchestrator
        .create_transaction(CreateTransactionRequest {
            source_wallet_id: source,
            destination_wallet_id: destination,
            amount: record.amount,
            currency: record.currency.clone(),
            kind,
            description: record.description.clone(),
        })
        .await?;
    Ok(())
}
