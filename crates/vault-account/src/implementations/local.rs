//! Local private-key account.
//!
//! Loads a secp256k1 key from configuration and signs in-process with
//! alloy's `PrivateKeySigner`.

use crate::{AccountError, AccountInterface};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use vault_types::{
	with_0x_prefix, Address, Bytes, ConfigSchema, Field, FieldType, ImplementationRegistry,
	Schema, SecretString, ValidationError, B256,
};

/// Account backed by a private key held in memory.
pub struct LocalAccount {
	signer: PrivateKeySigner,
}

impl LocalAccount {
	/// Parses a hex private key, with or without the `0x` prefix.
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		let signer = private_key.with_exposed(|key| {
			key.trim()
				.parse::<PrivateKeySigner>()
				.map_err(|e| AccountError::InvalidKey(e.to_string()))
		})?;
		Ok(Self { signer })
	}
}

#[async_trait]
impl AccountInterface for LocalAccount {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalAccountSchema)
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	async fn sign_hash(&self, hash: &B256) -> Result<Bytes, AccountError> {
		let signature = self
			.signer
			.sign_hash(hash)
			.await
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;
		Ok(Bytes::copy_from_slice(&signature.as_bytes()))
	}

	fn get_private_key(&self) -> SecretString {
		SecretString::new(with_0x_prefix(&hex::encode(
			self.signer.credential().to_bytes(),
		)))
	}
}

/// Configuration schema for LocalAccount.
pub struct LocalAccountSchema;

impl ConfigSchema for LocalAccountSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().unwrap_or_default();
					let hex_part = key.trim().trim_start_matches("0x");
					if hex_part.len() != 64 {
						return Err("private key must be 64 hex characters".to_string());
					}
					if hex::decode(hex_part).is_err() {
						return Err("private key must be valid hex".to_string());
					}
					Ok(())
				}),
			],
			vec![],
		);
		schema.validate(config)
	}
}

/// Factory function to create a local account from configuration.
///
/// Configuration parameters:
/// - `private_key`: hex encoded secp256k1 key (usually `${VAULT_PRIVATE_KEY}`)
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalAccountSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidKey(e.to_string()))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".into()))?;

	Ok(Box::new(LocalAccount::new(&private_key)?))
}

/// Registry for the local account implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = crate::AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl crate::AccountRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, keccak256, PrimitiveSignature};

	// Well-known development key (anvil/hardhat account #0).
	const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn config(key: &str) -> toml::Value {
		toml::from_str(&format!("private_key = \"{}\"", key)).unwrap()
	}

	#[tokio::test]
	async fn test_address_from_key() {
		let account = create_account(&config(DEV_KEY)).unwrap();
		assert_eq!(
			account.address().await.unwrap(),
			address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
		);
	}

	#[tokio::test]
	async fn test_sign_hash_recovers_to_address() {
		let account = create_account(&config(DEV_KEY)).unwrap();
		let hash = keccak256(b"simplypay");
		let signature = account.sign_hash(&hash).await.unwrap();
		assert_eq!(signature.len(), 65);

		let parsed = PrimitiveSignature::try_from(signature.as_ref()).unwrap();
		assert_eq!(
			parsed.recover_address_from_prehash(&hash).unwrap(),
			account.address().await.unwrap()
		);
	}

	#[test]
	fn test_private_key_round_trip() {
		let account = LocalAccount::new(&SecretString::from(DEV_KEY)).unwrap();
		assert_eq!(account.get_private_key().expose_secret(), DEV_KEY);
	}

	#[test]
	fn test_invalid_keys_rejected() {
		assert!(create_account(&config("0x1234")).is_err());
		assert!(create_account(&config(&format!("0x{}", "zz".repeat(32)))).is_err());
		assert!(create_account(&toml::Value::Table(Default::default())).is_err());
	}
}
