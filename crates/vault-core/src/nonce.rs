//! Per-account replay protection.

use std::collections::BTreeMap;
use thiserror::Error;
use vault_types::{Address, U256};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NonceError {
	/// The claimed nonce is not exactly the current one plus one.
	#[error("Invalid nonce: expected {expected}, got {got}")]
	Stale { expected: U256, got: U256 },
}

/// Last consumed nonce of every account that has signed something.
///
/// Nonces only move forward, one step at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NonceRegistry {
	nonces: BTreeMap<Address, U256>,
}

impl NonceRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Last consumed nonce; zero for unseen accounts.
	pub fn current_nonce(&self, account: &Address) -> U256 {
		self.nonces.get(account).copied().unwrap_or_default()
	}

	/// Consumes `claimed` if it is exactly the current nonce plus one.
	pub fn consume(&mut self, account: Address, claimed: U256) -> Result<(), NonceError> {
		let current = self.current_nonce(&account);
		// At U256::MAX the account can never sign again.
		let expected = current.checked_add(U256::from(1u64));
		if expected != Some(claimed) {
			return Err(NonceError::Stale {
				expected: expected.unwrap_or(current),
				got: claimed,
			});
		}
		self.nonces.insert(account, claimed);
		Ok(())
	}

	pub(crate) fn iter(&self) -> impl Iterator<Item = (&Address, &U256)> {
		self.nonces.iter()
	}

	pub(crate) fn restore(&mut self, account: Address, nonce: U256) {
		if !nonce.is_zero() {
			self.nonces.insert(account, nonce);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const ALICE: Address = Address::repeat_byte(0xa1);

	#[test]
	fn test_unseen_account_is_zero() {
		let registry = NonceRegistry::new();
		assert_eq!(registry.current_nonce(&ALICE), U256::ZERO);
	}

	#[test]
	fn test_consume_advances_by_one() {
		let mut registry = NonceRegistry::new();
		registry.consume(ALICE, U256::from(1u64)).unwrap();
		registry.consume(ALICE, U256::from(2u64)).unwrap();
		assert_eq!(registry.current_nonce(&ALICE), U256::from(2u64));
	}

	#[test]
	fn test_replay_and_gap_rejected() {
		let mut registry = NonceRegistry::new();
		registry.consume(ALICE, U256::from(1u64)).unwrap();

		assert_eq!(
			registry.consume(ALICE, U256::from(1u64)),
			Err(NonceError::Stale {
				expected: U256::from(2u64),
				got: U256::from(1u64)
			})
		);
		assert!(registry.consume(ALICE, U256::from(3u64)).is_err());
		assert!(registry.consume(ALICE, U256::ZERO).is_err());
		assert_eq!(registry.current_nonce(&ALICE), U256::from(1u64));
	}

	#[test]
	fn test_accounts_are_independent() {
		let mut registry = NonceRegistry::new();
		let bob = Address::repeat_byte(0xb0);
		registry.consume(ALICE, U256::from(1u64)).unwrap();
		registry.consume(bob, U256::from(1u64)).unwrap();
		assert_eq!(registry.current_nonce(&bob), U256::from(1u64));
	}

	#[test]
	fn test_exhausted_nonce_space() {
		let mut registry = NonceRegistry::new();
		registry.restore(ALICE, U256::MAX);
		assert!(registry.consume(ALICE, U256::ZERO).is_err());
		assert!(registry.consume(ALICE, U256::MAX).is_err());
	}
}
