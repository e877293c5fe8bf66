//! Domain entities, value objects, and storage ports.

pub mod category;
pub mod events;
pub mod ports;
pub mod transaction;
pub mod wallet;
