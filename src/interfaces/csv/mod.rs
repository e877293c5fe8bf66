pub mod rule_reader;
pub mod scenario_reader;
pub mod wallet_writer;
