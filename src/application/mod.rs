//! Application services orchestrating the domain over the storage ports.

pub mod categorizer;
pub mod idempotency;
pub mod ledger;
pub mod orchestrator;
