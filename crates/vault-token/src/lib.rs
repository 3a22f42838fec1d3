//! External token collaborator for the SimplyPay vault.
//!
//! The vault never mints or burns: every custodial balance is backed by
//! tokens the custodian address holds on an ERC-20-like contract. This crate
//! abstracts that contract behind [`TokenInterface`], with an in-process
//! implementation for tests and devnets and an EVM implementation over
//! JSON-RPC.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use vault_types::{
	format_token_amount, Address, ConfigSchema, ImplementationRegistry, SecretString, U256,
};

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod memory;
}

/// Errors reported by the token contract or the transport to it.
#[derive(Debug, Error)]
pub enum TokenError {
	#[error("Insufficient allowance: needed {needed}, available {available}")]
	InsufficientAllowance { needed: U256, available: U256 },
	#[error("Insufficient token balance: needed {needed}, available {available}")]
	InsufficientBalance { needed: U256, available: U256 },
	#[error("Transfer failed: {0}")]
	TransferFailed(String),
	#[error("Network error: {0}")]
	Network(String),
	/// The transaction was broadcast but its outcome is unknown; it may still
	/// land on chain.
	#[error("Transaction {tx_hash} sent but not confirmed: {reason}")]
	Unconfirmed { tx_hash: String, reason: String },
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// An ERC-20-like token seen from the custodian's side.
///
/// `transfer_from` pulls into the custodian and `transfer` pushes out of it;
/// both return only once the movement is final. An error other than
/// [`TokenError::Unconfirmed`] means the tokens did not move.
#[async_trait]
pub trait TokenInterface: Send + Sync {
	/// Schema of this implementation's config table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Address holding the vault's pooled tokens.
	fn custodian(&self) -> Address;

	/// Token symbol, for display.
	fn symbol(&self) -> &str;

	/// Token decimals, for display.
	fn decimals(&self) -> u8;

	/// Moves `amount` from `from` to the custodian using `from`'s allowance.
	async fn transfer_from(&self, from: Address, amount: U256) -> Result<(), TokenError>;

	/// Moves `amount` from the custodian to `to`.
	async fn transfer(&self, to: Address, amount: U256) -> Result<(), TokenError>;

	/// Token balance of `owner`.
	async fn balance_of(&self, owner: Address) -> Result<U256, TokenError>;

	/// Allowance `owner` granted to the custodian.
	async fn allowance(&self, owner: Address) -> Result<U256, TokenError>;
}

/// Signature every token implementation's factory must have: the
/// implementation's config table, the custodian address, and the
/// custodian's private key when the implementation signs transactions.
pub type TokenFactory = fn(
	&toml::Value,
	&Address,
	Option<&SecretString>,
) -> Result<Box<dyn TokenInterface>, TokenError>;

/// Registry trait for token implementations.
pub trait TokenRegistry: ImplementationRegistry<Factory = TokenFactory> {}

/// Get all registered token implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, TokenFactory)> {
	use implementations::{evm::alloy, memory};

	vec![
		(alloy::Registry::NAME, alloy::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Service wrapping the configured token implementation.
pub struct TokenService {
	implementation: Arc<dyn TokenInterface>,
}

impl TokenService {
	pub fn new(implementation: Arc<dyn TokenInterface>) -> Self {
		Self { implementation }
	}

	pub fn custodian(&self) -> Address {
		self.implementation.custodian()
	}

	pub fn symbol(&self) -> &str {
		self.implementation.symbol()
	}

	pub fn decimals(&self) -> u8 {
		self.implementation.decimals()
	}

	/// Formats a raw amount with this token's decimals and symbol.
	pub fn format(&self, amount: U256) -> String {
		format!(
			"{} {}",
			format_token_amount(&amount.to_string(), self.decimals()),
			self.symbol()
		)
	}

	/// Pulls `amount` from `from` into custody.
	pub async fn pull(&self, from: Address, amount: U256) -> Result<(), TokenError> {
		tracing::debug!(from = %from, amount = %amount, "Pulling tokens into custody");
		self.implementation.transfer_from(from, amount).await
	}

	/// Pushes `amount` out of custody to `to`.
	pub async fn push(&self, to: Address, amount: U256) -> Result<(), TokenError> {
		tracing::debug!(to = %to, amount = %amount, "Pushing tokens out of custody");
		self.implementation.transfer(to, amount).await
	}

	pub async fn balance_of(&self, owner: Address) -> Result<U256, TokenError> {
		self.implementation.balance_of(owner).await
	}

	/// Tokens currently held by the custodian.
	pub async fn custody_balance(&self) -> Result<U256, TokenError> {
		self.implementation
			.balance_of(self.implementation.custodian())
			.await
	}

	pub async fn allowance(&self, owner: Address) -> Result<U256, TokenError> {
		self.implementation.allowance(owner).await
	}
}

impl TokenError {
	/// Whether the tokens may have moved despite the error.
	pub fn is_unconfirmed(&self) -> bool {
		matches!(self, TokenError::Unconfirmed { .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryToken;

	#[tokio::test]
	async fn test_service_custody_balance_and_format() {
		let custodian = Address::repeat_byte(0xcc);
		let user = Address::repeat_byte(0x01);
		let token = MemoryToken::new(custodian, "USDT", 6);
		token.mint(user, U256::from(2_500_000u64)).await;
		token.approve(user, custodian, U256::MAX).await;

		let service = TokenService::new(Arc::new(token));
		service.pull(user, U256::from(1_500_000u64)).await.unwrap();

		assert_eq!(
			service.custody_balance().await.unwrap(),
			U256::from(1_500_000u64)
		);
		assert_eq!(service.format(U256::from(1_500_000u64)), "1.5 USDT");
	}

	#[test]
	fn test_only_unconfirmed_errors_are_ambiguous() {
		let unconfirmed = TokenError::Unconfirmed {
			tx_hash: "0xabc".into(),
			reason: "timeout".into(),
		};
		assert!(unconfirmed.is_unconfirmed());
		assert!(unconfirmed.to_string().contains("0xabc"));
		assert!(!TokenError::Network("down".into()).is_unconfirmed());
		assert!(!TokenError::TransferFailed("reverted".into()).is_unconfirmed());
	}

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["evm", "memory"]);
	}
}
