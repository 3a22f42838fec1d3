//! Main entry point for the SimplyPay vault service.
//!
//! Builds the vault engine from a configuration file and runs it alongside
//! the HTTP API until interrupted.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use vault_config::Config;
use vault_core::{VaultBuilder, VaultEngine, VaultFactories};

mod apis;
mod server;

use vault_account::implementations::local::create_account;
use vault_storage::implementations::file::create_storage as create_file_storage;
use vault_storage::implementations::memory::create_storage as create_memory_storage;
use vault_token::implementations::evm::alloy::create_token as create_evm_token;
use vault_token::implementations::memory::create_token as create_memory_token;

/// Command-line arguments for the vault service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started vault");

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!("Loaded configuration [{}]", config.vault.id);

	let engine = Arc::new(build_vault(config.clone()).await?);
	engine.initialize().await?;

	match config.api.as_ref().filter(|api| api.enabled) {
		Some(api_config) => {
			let engine_task = engine.run();
			let api_task = server::start_server(api_config.clone(), Arc::clone(&engine));

			tokio::select! {
				result = engine_task => {
					tracing::info!("Vault engine finished");
					result?;
				}
				result = api_task => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("Starting vault without API");
			engine.run().await?;
		},
	}

	engine.shutdown().await?;
	tracing::info!("Stopped vault");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};

    // Variant for token factories that take the custodian and its key
    ($interface:path, $error:path, custodian, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value, &vault_types::Address, Option<&vault_types::SecretString>) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Wires the concrete storage, account and token implementations linked
/// into this binary and builds the engine.
async fn build_vault(config: Config) -> Result<VaultEngine, Box<dyn std::error::Error>> {
	let builder = VaultBuilder::new(config);

	let storage_factories = create_factory_map!(
		vault_storage::StorageInterface,
		vault_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	let account_factories = create_factory_map!(
		vault_account::AccountInterface,
		vault_account::AccountError,
		"local" => create_account,
	);

	let token_factories = create_factory_map!(
		vault_token::TokenInterface,
		vault_token::TokenError,
		custodian,
		"evm" => create_evm_token,
		"memory" => create_memory_token,
	);

	let factories = VaultFactories {
		storage_factories,
		account_factories,
		token_factories,
	};

	Ok(builder.build(factories).await?)
}
