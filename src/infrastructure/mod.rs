//! Storage and messaging adapters.

pub mod event_bus;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
