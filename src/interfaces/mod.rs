//! Inbound/outbound adapters: REST surface and CSV readers/writers.

pub mod csv;
pub mod http;
