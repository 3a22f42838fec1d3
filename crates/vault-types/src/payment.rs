//! Off-chain signed messages accepted by the vault.
//!
//! A `PaymentRequest` lets an account holder authorize a transfer from their
//! custodial balance to whoever presents the signature. A
//! `WithdrawalAuthorization` lets them pull funds out of custody without an
//! on-chain transaction of their own, and a `DepositAuthorization` lets the
//! custodian spend their token allowance into their custodial balance. All
//! are hashed per EIP-712 under the vault's domain and share the holder's
//! nonce sequence.

use crate::api::u256_serde;
use crate::utils::eip712::{
	Eip712AbiEncoder, DEPOSIT_TYPE, PAYMENT_REQUEST_TYPE, WITHDRAWAL_TYPE,
};
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// A payment authorization signed by `sender`.
///
/// The recipient is not part of the signed data: the vault credits whoever
/// submits the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
	/// Account whose balance is debited.
	pub sender: Address,
	/// Amount in the token's smallest unit.
	#[serde(with = "u256_serde")]
	pub amount: U256,
	/// Must be exactly the sender's current nonce plus one.
	#[serde(with = "u256_serde")]
	pub nonce: U256,
	/// Last UNIX second at which the request is still valid.
	#[serde(with = "u256_serde")]
	pub expire: U256,
}

impl PaymentRequest {
	pub fn new(sender: Address, amount: U256, nonce: U256, expire: U256) -> Self {
		Self {
			sender,
			amount,
			nonce,
			expire,
		}
	}

	/// EIP-712 `hashStruct` of this request.
	pub fn struct_hash(&self) -> B256 {
		let mut enc = Eip712AbiEncoder::for_type(PAYMENT_REQUEST_TYPE);
		enc.push_address(&self.sender);
		enc.push_u256(self.amount);
		enc.push_u256(self.nonce);
		enc.push_u256(self.expire);
		enc.hash()
	}

	/// Whether the request is still valid at `now` (inclusive).
	pub fn is_live_at(&self, now: u64) -> bool {
		self.expire >= U256::from(now)
	}
}

/// A withdrawal signed by the account holder, paid out to `recipient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalAuthorization {
	/// Always `"Withdraw"`.
	pub action: String,
	#[serde(with = "u256_serde")]
	pub amount: U256,
	/// External address receiving the tokens.
	pub recipient: Address,
	#[serde(with = "u256_serde")]
	pub nonce: U256,
}

impl WithdrawalAuthorization {
	pub fn new(amount: U256, recipient: Address, nonce: U256) -> Self {
		Self {
			action: crate::utils::WITHDRAW_ACTION.to_string(),
			amount,
			recipient,
			nonce,
		}
	}

	/// EIP-712 `hashStruct` of this authorization.
	pub fn struct_hash(&self) -> B256 {
		let mut enc = Eip712AbiEncoder::for_type(WITHDRAWAL_TYPE);
		enc.push_string(&self.action);
		enc.push_u256(self.amount);
		enc.push_address(&self.recipient);
		enc.push_u256(self.nonce);
		enc.hash()
	}
}

/// A deposit signed by the account holder: the custodian may pull `amount`
/// from the signer's wallet and credit it to the signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositAuthorization {
	#[serde(with = "u256_serde")]
	pub amount: U256,
	#[serde(with = "u256_serde")]
	pub nonce: U256,
	/// Last UNIX second at which the authorization is still valid.
	#[serde(with = "u256_serde")]
	pub expire: U256,
}

impl DepositAuthorization {
	pub fn new(amount: U256, nonce: U256, expire: U256) -> Self {
		Self {
			amount,
			nonce,
			expire,
		}
	}

	pub fn struct_hash(&self) -> B256 {
		let mut enc = Eip712AbiEncoder::for_type(DEPOSIT_TYPE);
		enc.push_u256(self.amount);
		enc.push_u256(self.nonce);
		enc.push_u256(self.expire);
		enc.hash()
	}

	pub fn is_live_at(&self, now: u64) -> bool {
		self.expire >= U256::from(now)
	}
}

/// Balance and nonce of one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
	#[serde(with = "u256_serde")]
	pub balance: U256,
	#[serde(with = "u256_serde")]
	pub nonce: U256,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_request_json_uses_decimal_strings() {
		let request = PaymentRequest::new(
			Address::repeat_byte(0x11),
			U256::from(10_000_000u64),
			U256::from(1u64),
			U256::from(1_700_000_000u64),
		);
		let json = serde_json::to_value(&request).unwrap();
		assert_eq!(json["amount"], "10000000");
		assert_eq!(json["nonce"], "1");

		let back: PaymentRequest = serde_json::from_value(json).unwrap();
		assert_eq!(back, request);
	}

	#[test]
	fn test_request_accepts_numeric_json() {
		let json = serde_json::json!({
			"sender": "0x1111111111111111111111111111111111111111",
			"amount": 5000,
			"nonce": 2,
			"expire": "0x6553f100",
		});
		let request: PaymentRequest = serde_json::from_value(json).unwrap();
		assert_eq!(request.amount, U256::from(5000u64));
		assert_eq!(request.nonce, U256::from(2u64));
		assert_eq!(request.expire, U256::from(0x6553f100u64));
	}

	#[test]
	fn test_struct_hash_changes_with_every_field() {
		let base = PaymentRequest::new(
			Address::repeat_byte(0x11),
			U256::from(1u64),
			U256::from(1u64),
			U256::from(100u64),
		);
		let mut other = base.clone();
		other.amount = U256::from(2u64);
		assert_ne!(base.struct_hash(), other.struct_hash());

		let mut other = base.clone();
		other.expire = U256::from(101u64);
		assert_ne!(base.struct_hash(), other.struct_hash());
	}

	#[test]
	fn test_expiry_is_inclusive() {
		let request = PaymentRequest::new(
			Address::ZERO,
			U256::from(1u64),
			U256::from(1u64),
			U256::from(100u64),
		);
		assert!(request.is_live_at(99));
		assert!(request.is_live_at(100));
		assert!(!request.is_live_at(101));
	}

	#[test]
	fn test_deposit_hash_differs_from_payment_with_same_numbers() {
		let deposit = DepositAuthorization::new(U256::from(5u64), U256::from(1u64), U256::from(9u64));
		let payment = PaymentRequest::new(
			Address::ZERO,
			U256::from(5u64),
			U256::from(1u64),
			U256::from(9u64),
		);
		assert_ne!(deposit.struct_hash(), payment.struct_hash());
		assert!(deposit.is_live_at(9));
		assert!(!deposit.is_live_at(10));
	}
}
