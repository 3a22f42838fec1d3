//! Storage namespaces used by the vault.

use std::str::FromStr;

/// Storage keys for the vault's data collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Snapshot of balances and nonces, one record per vault instance
	Ledger,
	/// Receipts of committed operations
	Receipts,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Ledger => "ledger",
			StorageKey::Receipts => "receipts",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Ledger, Self::Receipts].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"ledger" => Ok(Self::Ledger),
			"receipts" => Ok(Self::Receipts),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
