use crate::domain::transaction::TransactionType;
use crate::domain::wallet::WalletKind;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a simulation scenario.
///
/// `open` rows create a wallet under the given label with an opening balance;
/// the remaining ops run a full transaction attempt against already-opened
/// wallets referenced by label.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioOp {
    Open,
    Transfer,
    Deposit,
    Withdrawal,
    Payment,
}

impl ScenarioOp {
    pub fn transaction_type(self) -> Option<TransactionType> {
        match self {
            ScenarioOp::Open => None,
            ScenarioOp::Transfer => Some(TransactionType::Transfer),
            ScenarioOp::Deposit => Some(TransactionType::Deposit),
            ScenarioOp::Withdrawal => Some(TransactionType::Withdrawal),
            ScenarioOp::Payment => Some(TransactionType::Payment),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScenarioRecord {
    pub op: ScenarioOp,
    pub wallet: String,
    pub destination: Option<String>,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
    /// Wallet kind for `open` rows (savings/checking/investment).
    pub kind: Option<String>,
    pub description: Option<String>,
}

impl ScenarioRecord {
    pub fn wallet_kind(&self) -> Result<WalletKind> {
        match self.kind.as_deref() {
            None | Some("") | Some("checking") => Ok(WalletKind::Checking),
            Some("savings") => Ok(WalletKind::Savings),
            Some("investment") => Ok(WalletKind::Investment),
            Some(other) => Err(LedgerError::Validation(format!(
                "Unknown wallet kind: {other}"
            ))),
        }
    }
}

/// Reads scenario records from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<ScenarioRecord>`,
/// trimming whitespace and allowing flexible record lengths so trailing
/// optional columns can be omitted.
pub struct ScenarioReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ScenarioReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes records, streaming large scenarios
    /// without loading them into memory.
    pub fn records(self) -> impl Iterator<Item = Result<ScenarioRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
