//! Builder for valid in-code configurations, mainly for tests.

use crate::{AccountConfig, ApiConfig, Config, StorageConfig, TokenConfig, VaultConfig};
use std::collections::HashMap;
use vault_types::{PROTOCOL_NAME, PROTOCOL_VERSION};

/// Anvil's first dev key, used when no key is given.
const DEFAULT_PRIVATE_KEY: &str =
	"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Fluent builder producing a [`Config`] with in-memory storage and token.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	vault_id: String,
	chain_id: u64,
	vault_address: Option<String>,
	private_key: String,
	token_primary: String,
	token_config: toml::Value,
	storage_primary: String,
	storage_config: toml::Value,
	storage_cleanup_interval_seconds: u64,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let empty = toml::Value::Table(toml::Table::new());
		Self {
			vault_id: "test-vault".to_string(),
			chain_id: 31337,
			vault_address: None,
			private_key: DEFAULT_PRIVATE_KEY.to_string(),
			token_primary: "memory".to_string(),
			token_config: empty.clone(),
			storage_primary: "memory".to_string(),
			storage_config: empty,
			storage_cleanup_interval_seconds: 60,
			api: None,
		}
	}

	pub fn vault_id(mut self, id: impl Into<String>) -> Self {
		self.vault_id = id.into();
		self
	}

	pub fn chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = chain_id;
		self
	}

	/// Sets the domain's `verifyingContract`.
	pub fn vault_address(mut self, address: impl Into<String>) -> Self {
		self.vault_address = Some(address.into());
		self
	}

	/// Sets the custodian key of the `local` account implementation.
	pub fn private_key(mut self, key: impl Into<String>) -> Self {
		self.private_key = key.into();
		self
	}

	pub fn token(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.token_primary = primary.into();
		self.token_config = config;
		self
	}

	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.storage_primary = primary.into();
		self.storage_config = config;
		self
	}

	pub fn storage_cleanup_interval_seconds(mut self, interval: u64) -> Self {
		self.storage_cleanup_interval_seconds = interval;
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	pub fn build(self) -> Config {
		let mut local = toml::Table::new();
		local.insert(
			"private_key".to_string(),
			toml::Value::String(self.private_key),
		);

		Config {
			vault: VaultConfig {
				id: self.vault_id,
				chain_id: self.chain_id,
				address: self.vault_address,
				domain_name: PROTOCOL_NAME.to_string(),
				domain_version: PROTOCOL_VERSION.to_string(),
			},
			account: AccountConfig {
				primary: "local".to_string(),
				implementations: HashMap::from([("local".to_string(), toml::Value::Table(local))]),
			},
			token: TokenConfig {
				implementations: HashMap::from([(self.token_primary.clone(), self.token_config)]),
				primary: self.token_primary,
			},
			storage: StorageConfig {
				implementations: HashMap::from([(
					self.storage_primary.clone(),
					self.storage_config,
				)]),
				primary: self.storage_primary,
				cleanup_interval_seconds: self.storage_cleanup_interval_seconds,
			},
			api: self.api,
		}
	}
}
