//! ERC-20 token access over JSON-RPC using Alloy.
//!
//! Reads go through `eth_call`; pulls and pushes are signed by the custodian
//! key and considered final once the receipt has the configured number of
//! confirmations. Success is judged by receipt status rather than the
//! call's return data, since USDT-style tokens return nothing.

use crate::{TokenError, TokenInterface};
use alloy_network::EthereumWallet;
use alloy_primitives::{Address, Bytes, FixedBytes, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{sol, SolCall};
use alloy_transport_http::Http;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use vault_types::{
	parse_address, with_0x_prefix, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema,
	SecretString, ValidationError,
};

sol! {
	interface IERC20 {
		function transfer(address to, uint256 amount) external;
		function transferFrom(address from, address to, uint256 amount) external;
		function balanceOf(address owner) external view returns (uint256);
		function allowance(address owner, address spender) external view returns (uint256);
	}
}

type HttpProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 7;
const SECONDS_PER_CONFIRMATION: u64 = 20;
const MAX_CONFIRMATION_WAIT_SECONDS: u64 = 3600;

/// ERC-20 token reached through an HTTP JSON-RPC endpoint.
pub struct EvmToken {
	provider: HttpProvider,
	token_address: Address,
	custodian: Address,
	symbol: String,
	decimals: u8,
	min_confirmations: u64,
	poll_interval: Duration,
}

/// Connection settings for [`EvmToken`].
pub struct EvmTokenConfig {
	pub rpc_url: String,
	pub chain_id: Option<u64>,
	pub token_address: Address,
	pub symbol: String,
	pub decimals: u8,
	pub min_confirmations: u64,
	pub poll_interval: Duration,
}

impl EvmToken {
	/// Builds a provider whose wallet signs as the custodian.
	pub fn new(config: EvmTokenConfig, signer: PrivateKeySigner) -> Result<Self, TokenError> {
		let url = config
			.rpc_url
			.parse()
			.map_err(|e| TokenError::Configuration(format!("Invalid RPC URL: {}", e)))?;

		let custodian = signer.address();
		let wallet = EthereumWallet::from(signer.with_chain_id(config.chain_id));

		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(wallet)
			.on_http(url);
		provider.client().set_poll_interval(config.poll_interval);

		Ok(Self {
			provider: Arc::new(provider) as HttpProvider,
			token_address: config.token_address,
			custodian,
			symbol: config.symbol,
			decimals: config.decimals,
			min_confirmations: config.min_confirmations,
			poll_interval: config.poll_interval,
		})
	}

	async fn call_u256(&self, data: Vec<u8>, what: &str) -> Result<U256, TokenError> {
		let result = self
			.provider
			.call(
				&TransactionRequest::default()
					.to(self.token_address)
					.input(Bytes::from(data).into()),
			)
			.await
			.map_err(|e| TokenError::Network(format!("Failed to call {}: {}", what, e)))?;

		if result.len() < 32 {
			return Err(TokenError::Network(format!("Invalid {} response", what)));
		}
		Ok(U256::from_be_slice(&result[..32]))
	}

	/// Sends `data` to the token contract and waits until it is final.
	async fn send_and_confirm(&self, data: Vec<u8>, what: &str) -> Result<(), TokenError> {
		let request = TransactionRequest::default()
			.to(self.token_address)
			.input(Bytes::from(data).into());

		let pending = self
			.provider
			.send_transaction(request)
			.await
			.map_err(|e| TokenError::Network(format!("Failed to send {}: {}", what, e)))?;

		let tx_hash = *pending.tx_hash();
		tracing::info!(
			tx_hash = %with_0x_prefix(&hex::encode(tx_hash)),
			call = what,
			"Submitted token transaction"
		);

		self.wait_for_confirmation(tx_hash, what).await
	}

	/// Polls for the receipt of an already broadcast transaction.
	///
	/// Only a reverted receipt is a definite failure; every other error
	/// leaves the outcome unknown and is reported as unconfirmed.
	async fn wait_for_confirmation(
		&self,
		tx_hash: FixedBytes<32>,
		what: &str,
	) -> Result<(), TokenError> {
		let unconfirmed = |reason: String| TokenError::Unconfirmed {
			tx_hash: with_0x_prefix(&hex::encode(tx_hash)),
			reason,
		};
		let timeout_seconds = (self.min_confirmations * SECONDS_PER_CONFIRMATION)
			.clamp(SECONDS_PER_CONFIRMATION, MAX_CONFIRMATION_WAIT_SECONDS);
		let max_wait = Duration::from_secs(timeout_seconds);
		let start = tokio::time::Instant::now();

		loop {
			if start.elapsed() > max_wait {
				return Err(unconfirmed(format!(
					"timeout waiting for {} confirmations of {} after {} seconds",
					self.min_confirmations, what, timeout_seconds
				)));
			}

			let receipt = match self.provider.get_transaction_receipt(tx_hash).await {
				Ok(Some(receipt)) => receipt,
				Ok(None) => {
					tokio::time::sleep(self.poll_interval).await;
					continue;
				},
				Err(e) => {
					return Err(unconfirmed(format!("failed to get receipt: {}", e)));
				},
			};

			if !receipt.status() {
				return Err(TokenError::TransferFailed(format!("{} reverted", what)));
			}

			let current_block = self
				.provider
				.get_block_number()
				.await
				.map_err(|e| unconfirmed(format!("failed to get block number: {}", e)))?;
			let tx_block = receipt.block_number.unwrap_or(current_block);
			// The inclusion block counts as the first confirmation.
			let confirmations = current_block.saturating_sub(tx_block) + 1;

			if confirmations >= self.min_confirmations {
				tracing::debug!(call = what, block = tx_block, "Token transaction confirmed");
				return Ok(());
			}

			tokio::time::sleep(self.poll_interval).await;
		}
	}
}

#[async_trait]
impl TokenInterface for EvmToken {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(EvmTokenSchema)
	}

	fn custodian(&self) -> Address {
		self.custodian
	}

	fn symbol(&self) -> &str {
		&self.symbol
	}

	fn decimals(&self) -> u8 {
		self.decimals
	}

	async fn transfer_from(&self, from: Address, amount: U256) -> Result<(), TokenError> {
		// Revert reasons are not surfaced by receipts, so check up front.
		let allowance = self.allowance(from).await?;
		if allowance < amount {
			return Err(TokenError::InsufficientAllowance {
				needed: amount,
				available: allowance,
			});
		}
		let balance = self.balance_of(from).await?;
		if balance < amount {
			return Err(TokenError::InsufficientBalance {
				needed: amount,
				available: balance,
			});
		}

		let call = IERC20::transferFromCall {
			from,
			to: self.custodian,
			amount,
		};
		self.send_and_confirm(call.abi_encode(), "transferFrom")
			.await
	}

	async fn transfer(&self, to: Address, amount: U256) -> Result<(), TokenError> {
		let balance = self.balance_of(self.custodian).await?;
		if balance < amount {
			return Err(TokenError::InsufficientBalance {
				needed: amount,
				available: balance,
			});
		}

		let call = IERC20::transferCall { to, amount };
		self.send_and_confirm(call.abi_encode(), "transfer").await
	}

	async fn balance_of(&self, owner: Address) -> Result<U256, TokenError> {
		let call = IERC20::balanceOfCall { owner };
		self.call_u256(call.abi_encode(), "balanceOf").await
	}

	async fn allowance(&self, owner: Address) -> Result<U256, TokenError> {
		let call = IERC20::allowanceCall {
			owner,
			spender: self.custodian,
		};
		self.call_u256(call.abi_encode(), "allowance").await
	}
}

/// Configuration schema for EvmToken.
pub struct EvmTokenSchema;

impl ConfigSchema for EvmTokenSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("rpc_url", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
							Ok(())
						},
						_ => Err("rpc_url must be an http(s) URL".to_string()),
					}
				}),
				Field::new("token_address", FieldType::Address),
			],
			vec![
				Field::new(
					"min_confirmations",
					FieldType::Integer {
						min: Some(1),
						max: Some(100),
					},
				),
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new("symbol", FieldType::String),
				Field::new(
					"decimals",
					FieldType::Integer {
						min: Some(0),
						max: Some(36),
					},
				),
				Field::new(
					"poll_interval_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(60),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create an EVM token from configuration.
///
/// Configuration parameters:
/// - `rpc_url`: HTTP JSON-RPC endpoint
/// - `token_address`: ERC-20 contract address
/// - `min_confirmations`: confirmations before a transfer is final (default 1)
/// - `chain_id`: chain id for transaction signing (optional)
/// - `symbol`, `decimals`: display metadata (default "USDT", 6)
/// - `poll_interval_seconds`: receipt polling interval (default 7)
///
/// The custodian key is required and must belong to `custodian`.
pub fn create_token(
	config: &toml::Value,
	custodian: &Address,
	private_key: Option<&SecretString>,
) -> Result<Box<dyn TokenInterface>, TokenError> {
	EvmTokenSchema
		.validate(config)
		.map_err(|e| TokenError::Configuration(e.to_string()))?;

	let private_key = private_key.ok_or_else(|| {
		TokenError::Configuration("evm token requires the custodian private key".to_string())
	})?;
	let signer: PrivateKeySigner = private_key
		.with_exposed(|key| key.parse::<PrivateKeySigner>())
		.map_err(|e| TokenError::Configuration(format!("Invalid private key: {}", e)))?;
	if signer.address() != *custodian {
		return Err(TokenError::Configuration(format!(
			"private key address {} does not match custodian {}",
			signer.address(),
			custodian
		)));
	}

	// Schema validation guarantees presence and shape of these fields.
	let rpc_url = config
		.get("rpc_url")
		.and_then(|v| v.as_str())
		.unwrap_or_default()
		.to_string();
	let token_address = config
		.get("token_address")
		.and_then(|v| v.as_str())
		.ok_or_else(|| TokenError::Configuration("token_address is required".to_string()))
		.and_then(|s| parse_address(s).map_err(TokenError::Configuration))?;
	let int = |key: &str| config.get(key).and_then(|v| v.as_integer());

	let token = EvmToken::new(
		EvmTokenConfig {
			rpc_url,
			chain_id: int("chain_id").map(|id| id as u64),
			token_address,
			symbol: config
				.get("symbol")
				.and_then(|v| v.as_str())
				.unwrap_or("USDT")
				.to_string(),
			decimals: int("decimals").map(|d| d as u8).unwrap_or(6),
			min_confirmations: int("min_confirmations").map(|c| c as u64).unwrap_or(1),
			poll_interval: Duration::from_secs(
				int("poll_interval_seconds")
					.map(|s| s as u64)
					.unwrap_or(DEFAULT_POLL_INTERVAL_SECONDS),
			),
		},
		signer,
	)?;

	Ok(Box::new(token))
}

/// Registry for the EVM token implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "evm";
	type Factory = crate::TokenFactory;

	fn factory() -> Self::Factory {
		create_token
	}
}

impl crate::TokenRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn config(extra: &str) -> toml::Value {
		toml::from_str(&format!(
			r#"
rpc_url = "http://localhost:8545"
token_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
{}
"#,
			extra
		))
		.unwrap()
	}

	#[test]
	fn test_schema_accepts_minimal_config() {
		assert!(EvmTokenSchema.validate(&config("")).is_ok());
	}

	#[test]
	fn test_schema_rejects_bad_confirmations() {
		let result = EvmTokenSchema.validate(&config("min_confirmations = 0"));
		assert!(matches!(
			result,
			Err(ValidationError::InvalidValue { field, .. }) if field == "min_confirmations"
		));
	}

	#[test]
	fn test_schema_rejects_non_http_url() {
		let value: toml::Value = toml::from_str(
			r#"
rpc_url = "ws://localhost:8545"
token_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
"#,
		)
		.unwrap();
		assert!(EvmTokenSchema.validate(&value).is_err());
	}

	#[test]
	fn test_factory_requires_key() {
		let result = create_token(&config(""), &Address::repeat_byte(1), None);
		assert!(matches!(result, Err(TokenError::Configuration(_))));
	}

	#[test]
	fn test_factory_rejects_foreign_custodian() {
		let key = SecretString::from(DEV_KEY);
		let result = create_token(&config(""), &Address::repeat_byte(1), Some(&key));
		assert!(matches!(result, Err(TokenError::Configuration(msg)) if msg.contains("does not match")));
	}

	fn unreachable_token() -> EvmToken {
		EvmToken::new(
			EvmTokenConfig {
				// Nothing listens on the discard port.
				rpc_url: "http://127.0.0.1:9".into(),
				chain_id: Some(31337),
				token_address: Address::repeat_byte(0x55),
				symbol: "USDT".into(),
				decimals: 6,
				min_confirmations: 1,
				poll_interval: Duration::from_millis(10),
			},
			DEV_KEY.parse().unwrap(),
		)
		.unwrap()
	}

	#[tokio::test]
	async fn test_receipt_failure_after_broadcast_is_unconfirmed() {
		let token = unreachable_token();
		let tx_hash = FixedBytes::<32>::repeat_byte(0xab);

		let result = token.wait_for_confirmation(tx_hash, "transfer").await;
		match result {
			Err(TokenError::Unconfirmed { tx_hash, reason }) => {
				assert_eq!(tx_hash, with_0x_prefix(&hex::encode([0xab; 32])));
				assert!(reason.contains("receipt"));
			},
			other => panic!("expected unconfirmed, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_failure_before_broadcast_is_definite() {
		let token = unreachable_token();
		let result = token.transfer(Address::repeat_byte(1), U256::from(1u64)).await;
		assert!(matches!(result, Err(TokenError::Network(_))));
	}

	#[tokio::test]
	async fn test_factory_builds_for_matching_custodian() {
		let key = SecretString::from(DEV_KEY);
		let custodian = parse_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap();
		let token = create_token(&config("symbol = \"USDT\"\ndecimals = 6"), &custodian, Some(&key))
			.unwrap();
		assert_eq!(token.custodian(), custodian);
		assert_eq!(token.decimals(), 6);
	}
}
