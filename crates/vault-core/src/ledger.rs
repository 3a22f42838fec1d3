//! Custodial balances.
//!
//! The ledger only does arithmetic. Token movements that back a credit or a
//! debit are sequenced by the engine, which decides when a ledger change is
//! committed relative to the matching pull or push.

use std::collections::BTreeMap;
use thiserror::Error;
use vault_types::{Address, U256};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
	#[error("Amount must be greater than zero")]
	ZeroAmount,
	#[error("Insufficient balance")]
	InsufficientBalance { needed: U256, available: U256 },
	#[error("Balance overflow")]
	Overflow,
}

/// Balance per account. Accounts are created implicitly at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
	balances: BTreeMap<Address, U256>,
}

impl Ledger {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn balance_of(&self, account: &Address) -> U256 {
		self.balances.get(account).copied().unwrap_or_default()
	}

	pub fn credit(&mut self, account: Address, amount: U256) -> Result<(), LedgerError> {
		let balance = self
			.balance_of(&account)
			.checked_add(amount)
			.ok_or(LedgerError::Overflow)?;
		self.set(account, balance);
		Ok(())
	}

	pub fn debit(&mut self, account: Address, amount: U256) -> Result<(), LedgerError> {
		let available = self.balance_of(&account);
		if amount > available {
			return Err(LedgerError::InsufficientBalance {
				needed: amount,
				available,
			});
		}
		self.set(account, available - amount);
		Ok(())
	}

	/// Moves `amount` from `from` to `to`; either both sides change or
	/// neither does.
	pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
		let available = self.balance_of(&from);
		if amount > available {
			return Err(LedgerError::InsufficientBalance {
				needed: amount,
				available,
			});
		}
		if from == to {
			return Ok(());
		}
		let credited = self
			.balance_of(&to)
			.checked_add(amount)
			.ok_or(LedgerError::Overflow)?;

		self.set(from, available - amount);
		self.set(to, credited);
		Ok(())
	}

	/// Sum of all balances. Saturates, though it is bounded by the token
	/// supply in practice.
	pub fn total(&self) -> U256 {
		self.balances
			.values()
			.fold(U256::ZERO, |acc, b| acc.saturating_add(*b))
	}

	pub(crate) fn iter(&self) -> impl Iterator<Item = (&Address, &U256)> {
		self.balances.iter()
	}

	/// Zero balances are not stored.
	fn set(&mut self, account: Address, balance: U256) {
		if balance.is_zero() {
			self.balances.remove(&account);
		} else {
			self.balances.insert(account, balance);
		}
	}

	pub(crate) fn restore(&mut self, account: Address, balance: U256) {
		self.set(account, balance);
	}
}
