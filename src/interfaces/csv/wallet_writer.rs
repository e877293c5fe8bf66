use crate::domain::wallet::Wallet;
use crate::error::Result;
use std::io::Write;

/// Writes the final wallet state of a simulation run as CSV.
pub struct WalletSummaryWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> WalletSummaryWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes one row per labeled wallet, sorted by label for stable output.
    pub fn write_summary(&mut self, mut wallets: Vec<(String, Wallet)>) -> Result<()> {
        self.writer
            .write_record(["wallet", "currency", "balance", "version", "active"])?;
        wallets.sort_by(|a, b| a.0.cmp(&b.0));
        for (label, wallet) in wallets {
            self.writer.write_record([
                label.as_str(),
                wallet.currency.as_str(),
                &wallet.balance.value().to_string(),
                &wallet.version.to_string(),
                &wallet.active.to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
