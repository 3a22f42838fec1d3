//! Events emitted by the vault.
//!
//! An event is published for every committed operation and never for a
//! rejected one. Events flow through the engine's event bus and are recorded
//! in receipts.

use crate::api::u256_serde;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Observable outcome of a committed vault operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VaultEvent {
	/// Tokens were pulled into custody and credited to `account`.
	Deposit {
		account: Address,
		#[serde(with = "u256_serde")]
		amount: U256,
	},
	/// Tokens were debited from `account` and pushed back to it.
	Withdraw {
		account: Address,
		#[serde(with = "u256_serde")]
		amount: U256,
	},
	/// A signed payment request moved balance from `sender` to `recipient`.
	PaymentSuccess { sender: Address, recipient: Address },
	/// A signed withdrawal paid `amount` of `signer`'s balance out to `recipient`.
	WithdrawalAuthorized {
		signer: Address,
		recipient: Address,
		#[serde(with = "u256_serde")]
		amount: U256,
	},
}

impl VaultEvent {
	/// Short event name, as used in logs.
	pub fn name(&self) -> &'static str {
		match self {
			VaultEvent::Deposit { .. } => "Deposit",
			VaultEvent::Withdraw { .. } => "Withdraw",
			VaultEvent::PaymentSuccess { .. } => "PaymentSuccess",
			VaultEvent::WithdrawalAuthorized { .. } => "WithdrawalAuthorized",
		}
	}
}

/// Record of a committed operation, returned to the caller and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
	/// Unique receipt identifier.
	pub id: String,
	pub event: VaultEvent,
	/// UNIX seconds at commit time.
	pub timestamp: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_event_json_is_tagged() {
		let event = VaultEvent::PaymentSuccess {
			sender: Address::repeat_byte(1),
			recipient: Address::repeat_byte(2),
		};
		let json = serde_json::to_value(&event).unwrap();
		assert_eq!(json["type"], "PaymentSuccess");
		assert_eq!(event.name(), "PaymentSuccess");
	}
}
