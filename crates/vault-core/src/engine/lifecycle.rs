//! Startup and shutdown of the vault engine.

use super::VaultEngine;
use crate::VaultError;

impl VaultEngine {
	/// Logs the vault's identity and checks solvency.
	///
	/// A shortfall is reported but does not prevent startup: the ledger is
	/// the record of what users are owed either way.
	pub async fn initialize(&self) -> Result<(), VaultError> {
		tracing::info!(
			vault_id = %self.config.vault.id,
			chain_id = self.domain.chain_id(),
			verifying_contract = %self.domain.verifying_contract(),
			custodian = %self.token.custodian(),
			"Initializing vault engine"
		);

		let report = self.audit().await?;
		if report.solvent {
			tracing::info!(
				ledger_total = %self.token.format(report.ledger_total),
				custody_balance = %self.token.format(report.custody_balance),
				"Vault is solvent"
			);
		} else {
			tracing::warn!(
				ledger_total = %self.token.format(report.ledger_total),
				custody_balance = %self.token.format(report.custody_balance),
				"Vault custody does not cover the ledger"
			);
		}
		Ok(())
	}

	pub async fn shutdown(&self) -> Result<(), VaultError> {
		tracing::info!("Shutting down vault engine");
		let state = self.state.lock().await;
		self.persist(&state).await
	}
}
