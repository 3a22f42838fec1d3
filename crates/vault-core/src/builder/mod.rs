//! Assembly of a [`VaultEngine`] from configuration.
//!
//! Implementations are looked up by name in factory maps, so the binary
//! decides which storage, account and token backends are linked in.

use crate::domain::DomainSeparator;
use crate::engine::{event_bus::EventBus, state::VaultState, VaultEngine};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use vault_account::{AccountError, AccountInterface, AccountService};
use vault_config::Config;
use vault_storage::{StorageError, StorageInterface, StorageService};
use vault_token::{TokenError, TokenInterface, TokenService};
use vault_types::{Address, SecretString};

const EVENT_BUS_CAPACITY: usize = 1000;

/// Errors that can occur while building a vault engine.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by
/// implementation name.
pub struct VaultFactories<SF, AF, TF> {
	pub storage_factories: HashMap<String, SF>,
	pub account_factories: HashMap<String, AF>,
	pub token_factories: HashMap<String, TF>,
}

/// Builds a [`VaultEngine`] from a validated [`Config`].
pub struct VaultBuilder {
	config: Config,
}

/// Instantiates `section.primary` with its factory, logging like the other
/// components do.
fn create_primary<F, T, E>(
	component: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
	factories: &HashMap<String, F>,
	create: impl FnOnce(&F, &toml::Value) -> Result<T, E>,
) -> Result<T, BuilderError>
where
	E: std::fmt::Display,
{
	let config = implementations.get(primary).ok_or_else(|| {
		BuilderError::Config(format!(
			"Primary {} '{}' has no configuration",
			component, primary
		))
	})?;
	let factory = factories.get(primary).ok_or_else(|| {
		BuilderError::MissingComponent(format!(
			"{} implementation '{}' is not available in this build",
			component, primary
		))
	})?;

	match create(factory, config) {
		Ok(implementation) => {
			tracing::info!(component = %component, implementation = %primary, "Loaded");
			Ok(implementation)
		},
		Err(e) => {
			tracing::error!(
				component = %component,
				implementation = %primary,
				error = %e,
				"Failed to create implementation"
			);
			Err(BuilderError::Config(format!(
				"Failed to create {} implementation '{}': {}",
				component, primary, e
			)))
		},
	}
}

impl VaultBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds storage, custodian account and token, loads the persisted
	/// state and returns the engine.
	pub async fn build<SF, AF, TF>(
		self,
		factories: VaultFactories<SF, AF, TF>,
	) -> Result<VaultEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		AF: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>,
		TF: Fn(
			&toml::Value,
			&Address,
			Option<&SecretString>,
		) -> Result<Box<dyn TokenInterface>, TokenError>,
	{
		let storage_backend = create_primary(
			"storage",
			&self.config.storage.primary,
			&self.config.storage.implementations,
			&factories.storage_factories,
			|factory, config| factory(config),
		)?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let account_impl = create_primary(
			"account",
			&self.config.account.primary,
			&self.config.account.implementations,
			&factories.account_factories,
			|factory, config| factory(config),
		)?;
		let account = AccountService::new(account_impl);

		let custodian = account.get_address().await.map_err(|e| {
			tracing::error!(component = "account", error = %e, "Failed to get custodian address");
			BuilderError::Config(format!("Failed to get custodian address: {}", e))
		})?;
		let private_key = account.get_private_key();

		let token_impl = create_primary(
			"token",
			&self.config.token.primary,
			&self.config.token.implementations,
			&factories.token_factories,
			|factory, config| factory(config, &custodian, Some(&private_key)),
		)?;
		let token = Arc::new(TokenService::new(Arc::from(token_impl)));

		let verifying_contract = self
			.config
			.vault
			.verifying_contract()
			.map_err(|e| BuilderError::Config(e.to_string()))?
			.unwrap_or(custodian);
		let domain = DomainSeparator::new(
			self.config.vault.domain_name.clone(),
			self.config.vault.domain_version.clone(),
			self.config.vault.chain_id,
			verifying_contract,
		);
		tracing::info!(
			separator = %domain.separator(),
			verifying_contract = %verifying_contract,
			"Signing domain ready"
		);

		let state = VaultState::load(&storage, &self.config.vault.id)
			.await
			.map_err(|e| BuilderError::Config(format!("Failed to load vault state: {}", e)))?;

		match token.custody_balance().await {
			Ok(balance) => {
				tracing::info!(
					custodian = %custodian,
					balance = %token.format(balance),
					"Initial custody balance"
				);
			},
			Err(e) => {
				tracing::warn!(error = %e, "Failed to check initial custody balance");
			},
		}

		Ok(VaultEngine::new(
			self.config,
			storage,
			token,
			domain,
			state,
			EventBus::new(EVENT_BUS_CAPACITY),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use vault_config::builders::ConfigBuilder;

	fn factories() -> VaultFactories<
		vault_storage::StorageFactory,
		vault_account::AccountFactory,
		vault_token::TokenFactory,
	> {
		VaultFactories {
			storage_factories: vault_storage::get_all_implementations()
				.into_iter()
				.map(|(name, f)| (name.to_string(), f))
				.collect(),
			account_factories: vault_account::get_all_implementations()
				.into_iter()
				.map(|(name, f)| (name.to_string(), f))
				.collect(),
			token_factories: vault_token::get_all_implementations()
				.into_iter()
				.map(|(name, f)| (name.to_string(), f))
				.collect(),
		}
	}

	#[tokio::test]
	async fn test_build_defaults_domain_to_custodian() {
		let engine = VaultBuilder::new(ConfigBuilder::new().build())
			.build(factories())
			.await
			.unwrap();

		let custodian = engine.token().custodian();
		assert_eq!(engine.domain().verifying_contract(), custodian);
		assert_eq!(engine.domain().chain_id(), 31337);
		assert_eq!(engine.domain().name(), "SimplyPay");
	}

	#[tokio::test]
	async fn test_build_uses_configured_vault_address() {
		let config = ConfigBuilder::new()
			.vault_address("0x5FbDB2315678afecb367f032d93F642f64180aa3")
			.build();
		let engine = VaultBuilder::new(config).build(factories()).await.unwrap();
		assert_ne!(
			engine.domain().verifying_contract(),
			engine.token().custodian()
		);
	}

	#[tokio::test]
	async fn test_unknown_implementation_is_missing_component() {
		let config = ConfigBuilder::new()
			.token("ledger-nano", toml::Value::Table(toml::Table::new()))
			.build();
		let result = VaultBuilder::new(config).build(factories()).await;
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[tokio::test]
	async fn test_invalid_token_config_rejected() {
		let config = ConfigBuilder::new()
			.token("evm", toml::Value::Table(toml::Table::new()))
			.build();
		let result = VaultBuilder::new(config).build(factories()).await;
		assert!(matches!(result, Err(BuilderError::Config(msg)) if msg.contains("token")));
	}
}
