//! Custodian account management for the SimplyPay vault.
//!
//! The custodian is the key that holds the pooled tokens on the external
//! token contract. It signs outgoing token transfers and, when no explicit
//! instance address is configured, its address doubles as the vault's
//! `verifyingContract`.

use async_trait::async_trait;
use vault_types::{Address, Bytes, ConfigSchema, ImplementationRegistry, SecretString, B256};
use thiserror::Error;

pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Interface implemented by custodian key providers.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Schema of this implementation's config table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Address controlled by this account.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs a 32-byte prehash, returning the 65-byte `r || s || v` signature.
	async fn sign_hash(&self, hash: &B256) -> Result<Bytes, AccountError>;

	/// Private key, `0x` prefixed, for token implementations that sign
	/// their own transactions.
	fn get_private_key(&self) -> SecretString;
}

/// Signature every account implementation's factory must have.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Registry trait for account implementations.
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// Get all registered account implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Service wrapping the configured account implementation.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	pub async fn sign_hash(&self, hash: &B256) -> Result<Bytes, AccountError> {
		self.implementation.sign_hash(hash).await
	}

	pub fn get_private_key(&self) -> SecretString {
		self.implementation.get_private_key()
	}
}
