//! In-process ERC-20 simulation.
//!
//! Keeps balances and allowances in memory with standard `transferFrom`
//! semantics. Clones share state, so a test can keep a handle for minting
//! and approving while the engine owns another.

use crate::{TokenError, TokenInterface};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use vault_types::{
	parse_address, Address, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema,
	SecretString, ValidationError, U256,
};

const DEFAULT_SYMBOL: &str = "USDT";
const DEFAULT_DECIMALS: u8 = 6;

#[derive(Default)]
struct Ledger {
	balances: HashMap<Address, U256>,
	/// (owner, spender) -> remaining allowance
	allowances: HashMap<(Address, Address), U256>,
}

impl Ledger {
	fn balance(&self, owner: &Address) -> U256 {
		self.balances.get(owner).copied().unwrap_or_default()
	}

	fn move_tokens(&mut self, from: Address, to: Address, amount: U256) -> Result<(), TokenError> {
		let available = self.balance(&from);
		if available < amount {
			return Err(TokenError::InsufficientBalance {
				needed: amount,
				available,
			});
		}
		if from == to {
			return Ok(());
		}
		let credited = self
			.balance(&to)
			.checked_add(amount)
			.ok_or_else(|| TokenError::TransferFailed("balance overflow".into()))?;

		self.balances.insert(from, available - amount);
		self.balances.insert(to, credited);
		Ok(())
	}
}

/// Memory-backed token.
#[derive(Clone)]
pub struct MemoryToken {
	custodian: Address,
	symbol: String,
	decimals: u8,
	state: Arc<RwLock<Ledger>>,
}

impl MemoryToken {
	pub fn new(custodian: Address, symbol: impl Into<String>, decimals: u8) -> Self {
		Self {
			custodian,
			symbol: symbol.into(),
			decimals,
			state: Arc::new(RwLock::new(Ledger::default())),
		}
	}

	/// Creates `amount` new tokens for `to`.
	pub async fn mint(&self, to: Address, amount: U256) {
		let mut state = self.state.write().await;
		let balance = state.balance(&to).saturating_add(amount);
		state.balances.insert(to, balance);
	}

	/// Sets the allowance `owner` grants `spender`, like ERC-20 `approve`.
	pub async fn approve(&self, owner: Address, spender: Address, amount: U256) {
		self.state
			.write()
			.await
			.allowances
			.insert((owner, spender), amount);
	}

	/// Moves tokens between two arbitrary holders, like ERC-20 `transfer`
	/// called by `from`.
	pub async fn transfer_between(
		&self,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<(), TokenError> {
		self.state.write().await.move_tokens(from, to, amount)
	}
}

#[async_trait]
impl TokenInterface for MemoryToken {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryTokenSchema)
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
		let mut state = self.state.write().await;
		let key = (from, self.custodian);
		let available = state.allowances.get(&key).copied().unwrap_or_default();
		if available < amount {
			return Err(TokenError::InsufficientAllowance {
				needed: amount,
				available,
			});
		}

		state.move_tokens(from, self.custodian, amount)?;
		// An unlimited approval is never decremented, as in common ERC-20s.
		if available != U256::MAX {
			state.allowances.insert(key, available - amount);
		}
		Ok(())
	}

	async fn transfer(&self, to: Address, amount: U256) -> Result<(), TokenError> {
		self.state
			.write()
			.await
			.move_tokens(self.custodian, to, amount)
	}

	async fn balance_of(&self, owner: Address) -> Result<U256, TokenError> {
		Ok(self.state.read().await.balance(&owner))
	}

	async fn allowance(&self, owner: Address) -> Result<U256, TokenError> {
		Ok(self
			.state
			.read()
			.await
			.allowances
			.get(&(owner, self.custodian))
			.copied()
			.unwrap_or_default())
	}
}

/// Configuration schema for MemoryToken.
pub struct MemoryTokenSchema;

impl ConfigSchema for MemoryTokenSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let account = Schema::new(
			vec![
				Field::new("address", FieldType::Address),
				Field::new("balance", FieldType::Amount),
			],
			vec![Field::new("allowance", FieldType::Amount)],
		);
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("symbol", FieldType::String),
				Field::new(
					"decimals",
					FieldType::Integer {
						min: Some(0),
						max: Some(36),
					},
				),
				Field::new("accounts", FieldType::Array(Box::new(FieldType::Table(account)))),
			],
		);
		schema.validate(config)
	}
}

fn parse_amount(value: Option<&toml::Value>) -> Result<U256, TokenError> {
	match value {
		None => Ok(U256::ZERO),
		Some(toml::Value::Integer(i)) => Ok(U256::from(*i as u64)),
		Some(toml::Value::String(s)) => U256::from_str_radix(s, 10)
			.map_err(|e| TokenError::Configuration(format!("invalid amount '{}': {}", s, e))),
		Some(other) => Err(TokenError::Configuration(format!(
			"invalid amount type: {}",
			other.type_str()
		))),
	}
}

/// Factory function to create a memory token from configuration.
///
/// Configuration parameters:
/// - `symbol`: display symbol (default "USDT")
/// - `decimals`: display decimals (default 6)
/// - `accounts`: optional seed holders, each with `address`, `balance` and
///   an optional `allowance` granted to the custodian
///
/// Seeding happens before any task can observe the token, so the state
/// lock is taken with `try_write`.
pub fn create_token(
	config: &toml::Value,
	custodian: &Address,
	_private_key: Option<&SecretString>,
) -> Result<Box<dyn TokenInterface>, TokenError> {
	MemoryTokenSchema
		.validate(config)
		.map_err(|e| TokenError::Configuration(e.to_string()))?;

	let symbol = config
		.get("symbol")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_SYMBOL);
	let decimals = config
		.get("decimals")
		.and_then(|v| v.as_integer())
		.map(|d| d as u8)
		.unwrap_or(DEFAULT_DECIMALS);

	let token = MemoryToken::new(*custodian, symbol, decimals);
	{
		let mut state = token
			.state
			.try_write()
			.map_err(|e| TokenError::Configuration(e.to_string()))?;
		let accounts = config
			.get("accounts")
			.and_then(|v| v.as_array())
			.cloned()
			.unwrap_or_default();
		for account in &accounts {
			let address = account
				.get("address")
				.and_then(|v| v.as_str())
				.ok_or_else(|| TokenError::Configuration("account address missing".into()))
				.and_then(|s| parse_address(s).map_err(TokenError::Configuration))?;
			let balance = parse_amount(account.get("balance"))?;
			let allowance = parse_amount(account.get("allowance"))?;

			state.balances.insert(address, balance);
			if !allowance.is_zero() {
				state.allowances.insert((address, *custodian), allowance);
			}
		}
	}

	tracing::debug!(symbol = %symbol, decimals, "Created memory token");
	Ok(Box::new(token))
}

/// Registry for the memory token implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::TokenFactory;

	fn factory() -> Self::Factory {
		create_token
	}
}

impl crate::TokenRegistry for Registry {}
