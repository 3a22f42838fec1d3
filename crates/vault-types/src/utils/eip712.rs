//! EIP-712 hashing primitives for the vault's signed messages.
//!
//! These helpers provide:
//! - Domain hash computation (name, version, chainId, verifyingContract)
//! - Final digest computation (0x1901 || domainHash || structHash)
//! - A minimal ABI encoder for the static field types the vault signs over

use alloy_primitives::{keccak256, Address, B256, U256};

pub const DOMAIN_TYPE: &str =
	"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
pub const PAYMENT_REQUEST_TYPE: &str =
	"PaymentRequest(address sender,uint256 amount,uint256 nonce,uint256 expire)";
pub const WITHDRAWAL_TYPE: &str =
	"Withdrawal(string action,uint256 amount,address recipient,uint256 nonce)";
pub const DEPOSIT_TYPE: &str = "Deposit(uint256 amount,uint256 nonce,uint256 expire)";

/// Protocol name bound into every signature.
pub const PROTOCOL_NAME: &str = "SimplyPay";
/// Protocol version bound into every signature.
pub const PROTOCOL_VERSION: &str = "1.0";
/// The only action a `Withdrawal` message may carry.
pub const WITHDRAW_ACTION: &str = "Withdraw";

/// Compute the EIP-712 domain hash:
/// keccak256(abi.encode(typeHash, keccak256(name), keccak256(version), chainId, verifyingContract)).
pub fn compute_domain_hash(
	name: &str,
	version: &str,
	chain_id: u64,
	verifying_contract: &Address,
) -> B256 {
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&keccak256(DOMAIN_TYPE.as_bytes()));
	enc.push_string(name);
	enc.push_string(version);
	enc.push_u256(U256::from(chain_id));
	enc.push_address(verifying_contract);
	keccak256(enc.finish())
}

/// Compute the final EIP-712 digest: keccak256(0x1901 || domainHash || structHash).
pub fn compute_final_digest(domain_hash: &B256, struct_hash: &B256) -> B256 {
	let mut out = Vec::with_capacity(2 + 32 + 32);
	out.push(0x19);
	out.push(0x01);
	out.extend_from_slice(domain_hash.as_slice());
	out.extend_from_slice(struct_hash.as_slice());
	keccak256(out)
}

/// Minimal ABI encoder for the words of an EIP-712 struct hash.
///
/// Dynamic `string` members are encoded as the keccak256 of their UTF-8
/// bytes, as EIP-712 `encodeData` requires.
pub struct Eip712AbiEncoder {
	buf: Vec<u8>,
}

impl Default for Eip712AbiEncoder {
	fn default() -> Self {
		Self::new()
	}
}

impl Eip712AbiEncoder {
	pub fn new() -> Self {
		Self {
			buf: Vec::with_capacity(32 * 5),
		}
	}

	/// Starts an encoding with the type hash of `type_string`.
	pub fn for_type(type_string: &str) -> Self {
		let mut enc = Self::new();
		enc.push_b256(&keccak256(type_string.as_bytes()));
		enc
	}

	pub fn push_b256(&mut self, v: &B256) {
		self.buf.extend_from_slice(v.as_slice());
	}

	pub fn push_address(&mut self, addr: &Address) {
		let mut word = [0u8; 32];
		word[12..].copy_from_slice(addr.as_slice());
		self.buf.extend_from_slice(&word);
	}

	pub fn push_u256(&mut self, v: U256) {
		self.buf.extend_from_slice(&v.to_be_bytes::<32>());
	}

	pub fn push_string(&mut self, s: &str) {
		self.push_b256(&keccak256(s.as_bytes()));
	}

	pub fn finish(self) -> Vec<u8> {
		self.buf
	}

	/// Hashes the encoded words.
	pub fn hash(self) -> B256 {
		keccak256(self.finish())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use alloy_sol_types::{eip712_domain, SolStruct};

	mod typed {
		alloy_sol_types::sol! {
			struct PaymentRequest {
				address sender;
				uint256 amount;
				uint256 nonce;
				uint256 expire;
			}

			struct Withdrawal {
				string action;
				uint256 amount;
				address recipient;
				uint256 nonce;
			}

			struct Deposit {
				uint256 amount;
				uint256 nonce;
				uint256 expire;
			}
		}
	}

	const VAULT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

	#[test]
	fn test_domain_hash_matches_sol_types() {
		let expected = eip712_domain! {
			name: "SimplyPay",
			version: "1.0",
			chain_id: 1,
			verifying_contract: VAULT,
		}
		.hash_struct();

		assert_eq!(
			compute_domain_hash(PROTOCOL_NAME, PROTOCOL_VERSION, 1, &VAULT),
			expected
		);
	}

	#[test]
	fn test_domain_hash_binds_every_field() {
		let base = compute_domain_hash(PROTOCOL_NAME, PROTOCOL_VERSION, 1, &VAULT);
		assert_ne!(base, compute_domain_hash("Other", PROTOCOL_VERSION, 1, &VAULT));
		assert_ne!(base, compute_domain_hash(PROTOCOL_NAME, "2.0", 1, &VAULT));
		assert_ne!(base, compute_domain_hash(PROTOCOL_NAME, PROTOCOL_VERSION, 31337, &VAULT));
		assert_ne!(
			base,
			compute_domain_hash(PROTOCOL_NAME, PROTOCOL_VERSION, 1, &Address::ZERO)
		);
	}

	#[test]
	fn test_payment_digest_matches_sol_types() {
		let sender = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
		let request = typed::PaymentRequest {
			sender,
			amount: U256::from(1_000_000u64),
			nonce: U256::from(1u64),
			expire: U256::from(1_700_000_000u64),
		};
		let domain = eip712_domain! {
			name: "SimplyPay",
			version: "1.0",
			chain_id: 1,
			verifying_contract: VAULT,
		};

		let mut enc = Eip712AbiEncoder::for_type(PAYMENT_REQUEST_TYPE);
		enc.push_address(&sender);
		enc.push_u256(request.amount);
		enc.push_u256(request.nonce);
		enc.push_u256(request.expire);
		let struct_hash = enc.hash();
		assert_eq!(struct_hash, request.eip712_hash_struct());

		let domain_hash = compute_domain_hash(PROTOCOL_NAME, PROTOCOL_VERSION, 1, &VAULT);
		assert_eq!(
			compute_final_digest(&domain_hash, &struct_hash),
			request.eip712_signing_hash(&domain)
		);
	}

	#[test]
	fn test_withdrawal_struct_hash_matches_sol_types() {
		let recipient = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
		let withdrawal = typed::Withdrawal {
			action: WITHDRAW_ACTION.to_string(),
			amount: U256::from(500u64),
			recipient,
			nonce: U256::from(3u64),
		};

		let mut enc = Eip712AbiEncoder::for_type(WITHDRAWAL_TYPE);
		enc.push_string(WITHDRAW_ACTION);
		enc.push_u256(withdrawal.amount);
		enc.push_address(&recipient);
		enc.push_u256(withdrawal.nonce);

		assert_eq!(enc.hash(), withdrawal.eip712_hash_struct());
	}

	#[test]
	fn test_deposit_struct_hash_matches_sol_types() {
		let deposit = typed::Deposit {
			amount: U256::from(250u64),
			nonce: U256::from(2u64),
			expire: U256::from(1_700_000_000u64),
		};

		let mut enc = Eip712AbiEncoder::for_type(DEPOSIT_TYPE);
		enc.push_u256(deposit.amount);
		enc.push_u256(deposit.nonce);
		enc.push_u256(deposit.expire);
		assert_eq!(enc.hash(), deposit.eip712_hash_struct());
	}
}
