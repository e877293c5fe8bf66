use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub, SubAssign};
use uuid::Uuid;

/// Represents a monetary value held by a wallet.
///
/// This is a wrapper around `rust_decimal::Decimal` to enforce domain-specific
/// rules and provide type safety for financial calculations. A wallet balance
/// is never negative at any observable point; the ledger rejects debits that
/// would violate this before writing.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// Represents a positive monetary amount for transactions.
///
/// Ensures that transaction amounts are always strictly positive, including
/// when decoded from stored or transferred records.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(LedgerError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::fmt::Display for Balance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletKind {
    Savings,
    Checking,
    Investment,
}

/// A balance-holding account denominated in one currency.
///
/// `version` increments by exactly 1 on every successful mutation and is the
/// token for optimistic concurrency: writes are conditioned on the stored
/// version matching the version read at the start of the operation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Wallet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    /// ISO 4217 currency code (USD, EUR, etc.)
    pub currency: String,
    pub balance: Balance,
    pub kind: WalletKind,
    pub active: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(
        owner_id: Uuid,
        name: String,
        currency: String,
        initial_balance: Balance,
        kind: WalletKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            currency,
            balance: initial_balance,
            kind,
            active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Subtracts `amount` from the balance if sufficient funds are available.
    pub fn debit(&mut self, amount: Amount) -> Result<(), LedgerError> {
        let requested = Balance::from(amount);
        if self.balance < requested {
            return Err(LedgerError::InsufficientFunds {
                wallet_id: self.id,
                requested: amount.value(),
                available: self.balance.value(),
            });
        }
        self.balance -= requested;
        self.touch();
        Ok(())
    }

    /// Adds `amount` to the balance. Deposits are unbounded.
    pub fn credit(&mut self, amount: Amount) {
        self.balance += Balance::from(amount);
        self.touch();
    }

    /// Marks the wallet inactive. Wallets are never hard-deleted.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.touch();
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}
