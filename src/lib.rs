//! Wallet ledger and transaction orchestration engine.
//!
//! Moves money between wallets under optimistic concurrency, records every
//! attempt as an auditable transaction, and propagates outcomes through a
//! topic-exchange event channel with per-queue dead-lettering. Destination
//! credits and categorization are applied by asynchronous consumers, so the
//! system is eventually consistent between a source debit and the matching
//! destination credit.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
