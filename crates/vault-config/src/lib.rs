//! Configuration for the SimplyPay vault service.
//!
//! Loads the vault's TOML configuration, resolves environment variable
//! references and validates cross-section references before anything is
//! constructed from it.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(feature = "testing")]
pub mod builders;
mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use vault_types::{parse_address, Address, PROTOCOL_NAME, PROTOCOL_VERSION};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep only the message, not the echoed input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level vault configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this vault and its signing domain.
	pub vault: VaultConfig,
	/// Custodian key management.
	pub account: AccountConfig,
	/// The custodied token.
	pub token: TokenConfig,
	/// Persistence backend.
	pub storage: StorageConfig,
	/// HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Vault identity and EIP-712 domain parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VaultConfig {
	/// Identifier of this vault instance; also the key of its persisted state.
	pub id: String,
	/// Chain id bound into every signature.
	pub chain_id: u64,
	/// `verifyingContract` of the signing domain. Defaults to the custodian
	/// account address when unset.
	#[serde(default)]
	pub address: Option<String>,
	#[serde(default = "default_domain_name")]
	pub domain_name: String,
	#[serde(default = "default_domain_version")]
	pub domain_version: String,
}

fn default_domain_name() -> String {
	PROTOCOL_NAME.to_string()
}

fn default_domain_version() -> String {
	PROTOCOL_VERSION.to_string()
}

impl VaultConfig {
	/// Parsed `verifyingContract` override, if one is configured.
	pub fn verifying_contract(&self) -> Result<Option<Address>, ConfigError> {
		self.address
			.as_deref()
			.map(|s| parse_address(s).map_err(|e| ConfigError::Validation(format!("vault.address: {}", e))))
			.transpose()
	}
}

/// Configuration for custodian key management.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of account implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the external token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of token implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	pub cleanup_interval_seconds: u64,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply in reverse to keep earlier offsets valid.
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

fn require_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Checks cross-section references and value ranges.
	///
	/// Implementation tables are validated later by the implementations'
	/// own schemas.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.vault.id.is_empty() {
			return Err(ConfigError::Validation("Vault ID cannot be empty".into()));
		}
		if self.vault.chain_id == 0 {
			return Err(ConfigError::Validation(
				"Vault chain_id must be greater than 0".into(),
			));
		}
		if self.vault.domain_name.is_empty() || self.vault.domain_version.is_empty() {
			return Err(ConfigError::Validation(
				"Vault domain name and version cannot be empty".into(),
			));
		}
		self.vault.verifying_contract()?;

		require_primary("account", &self.account.primary, &self.account.implementations)?;
		require_primary("token", &self.token.primary, &self.token.implementations)?;
		require_primary("storage", &self.storage.primary, &self.storage.implementations)?;

		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		if let Some(api) = &self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation("API port cannot be 0".into()));
			}
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating the
/// result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BASE: &str = r#"
[vault]
id = "test-vault"
chain_id = 1

[account]
primary = "local"
[account.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"

[token]
primary = "memory"
[token.implementations.memory]
symbol = "USDT"
decimals = 6

[storage]
primary = "memory"
cleanup_interval_seconds = 3600
[storage.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("VAULT_TEST_HOST", "localhost");
		std::env::set_var("VAULT_TEST_PORT", "8545");

		let input = "rpc = \"${VAULT_TEST_HOST}:${VAULT_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "rpc = \"localhost:8545\"");

		std::env::remove_var("VAULT_TEST_HOST");
		std::env::remove_var("VAULT_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${VAULT_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${VAULT_MISSING_VAR}\"");
		assert!(result.unwrap_err().to_string().contains("VAULT_MISSING_VAR"));
	}

	#[test]
	fn test_parse_defaults() {
		let config: Config = BASE.parse().unwrap();
		assert_eq!(config.vault.id, "test-vault");
		assert_eq!(config.vault.domain_name, "SimplyPay");
		assert_eq!(config.vault.domain_version, "1.0");
		assert!(config.vault.verifying_contract().unwrap().is_none());
		assert!(config.api.is_none());
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("VAULT_TEST_ID", "from-env");
		let config: Config = BASE
			.replace("\"test-vault\"", "\"${VAULT_TEST_ID}\"")
			.parse()
			.unwrap();
		assert_eq!(config.vault.id, "from-env");
		std::env::remove_var("VAULT_TEST_ID");
	}

	#[test]
	fn test_verifying_contract_override() {
		let config: Config = BASE
			.replace(
				"chain_id = 1",
				"chain_id = 1\naddress = \"0x5FbDB2315678afecb367f032d93F642f64180aa3\"",
			)
			.parse()
			.unwrap();
		assert!(config.vault.verifying_contract().unwrap().is_some());
	}

	#[test]
	fn test_bad_verifying_contract_rejected() {
		let result = Config::from_str(
			&BASE.replace("chain_id = 1", "chain_id = 1\naddress = \"0x1234\""),
		);
		assert!(result.unwrap_err().to_string().contains("vault.address"));
	}

	#[test]
	fn test_zero_chain_id_rejected() {
		let result = Config::from_str(&BASE.replace("chain_id = 1", "chain_id = 0"));
		assert!(result.unwrap_err().to_string().contains("chain_id"));
	}

	#[test]
	fn test_unknown_primary_rejected() {
		let result = Config::from_str(&BASE.replace("primary = \"memory\"\n[token", "primary = \"evm\"\n[token"));
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("Primary token 'evm' not found"));
	}

	#[test]
	fn test_cleanup_interval_bounds() {
		let result = Config::from_str(
			&BASE.replace("cleanup_interval_seconds = 3600", "cleanup_interval_seconds = 0"),
		);
		assert!(result.is_err());
	}

	#[test]
	fn test_api_section() {
		let config: Config = format!("{}\n[api]\nenabled = true\nport = 8080\n", BASE)
			.parse()
			.unwrap();
		let api = config.api.unwrap();
		assert!(api.enabled);
		assert_eq!(api.port, 8080);
		assert_eq!(api.host, "127.0.0.1");
	}
}
