//! Vault state and its persisted snapshot.

use crate::ledger::Ledger;
use crate::nonce::NonceRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vault_storage::{StorageError, StorageService};
use vault_types::{Account, Address, StorageKey, U256};

/// Everything the vault mutates: balances and nonces.
///
/// Operations stage their effects on a clone and replace the live state only
/// once the clone has been persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultState {
	pub ledger: Ledger,
	pub nonces: NonceRegistry,
}

/// One persisted account row.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountRecord {
	address: Address,
	#[serde(flatten)]
	account: Account,
}

/// The whole state, as stored under the `ledger` namespace.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateSnapshot {
	accounts: Vec<AccountRecord>,
}

impl VaultState {
	pub fn account(&self, address: &Address) -> Account {
		Account {
			balance: self.ledger.balance_of(address),
			nonce: self.nonces.current_nonce(address),
		}
	}

	/// Loads the snapshot stored for `vault_id`, or an empty state.
	pub async fn load(storage: &StorageService, vault_id: &str) -> Result<Self, StorageError> {
		let snapshot: Option<StateSnapshot> = storage
			.retrieve_optional(StorageKey::Ledger.as_str(), vault_id)
			.await?;

		let mut state = Self::default();
		for record in snapshot.unwrap_or_default().accounts {
			state.ledger.restore(record.address, record.account.balance);
			state.nonces.restore(record.address, record.account.nonce);
		}
		Ok(state)
	}

	/// Writes the full state for `vault_id`.
	pub async fn persist(&self, storage: &StorageService, vault_id: &str) -> Result<(), StorageError> {
		storage
			.store(StorageKey::Ledger.as_str(), vault_id, &self.snapshot())
			.await
	}

	fn snapshot(&self) -> StateSnapshot {
		let mut rows: BTreeMap<Address, Account> = BTreeMap::new();
		for (address, balance) in self.ledger.iter() {
			rows.entry(*address).or_default().balance = *balance;
		}
		for (address, nonce) in self.nonces.iter() {
			rows.entry(*address).or_default().nonce = *nonce;
		}
		StateSnapshot {
			accounts: rows
				.into_iter()
				.map(|(address, account)| AccountRecord { address, account })
				.collect(),
		}
	}

	/// Sum of all custodial balances.
	pub fn ledger_total(&self) -> U256 {
		self.ledger.total()
	}
}
