//! The vault's EIP-712 signing domain.

use vault_types::{
	compute_domain_hash, compute_final_digest, Address, B256, PROTOCOL_NAME, PROTOCOL_VERSION,
};

/// Domain separator binding signatures to one protocol version, chain and
/// vault instance.
///
/// Computed once at construction and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSeparator {
	name: String,
	version: String,
	chain_id: u64,
	verifying_contract: Address,
	hash: B256,
}

impl DomainSeparator {
	pub fn new(
		name: impl Into<String>,
		version: impl Into<String>,
		chain_id: u64,
		verifying_contract: Address,
	) -> Self {
		let name = name.into();
		let version = version.into();
		let hash = compute_domain_hash(&name, &version, chain_id, &verifying_contract);
		Self {
			name,
			version,
			chain_id,
			verifying_contract,
			hash,
		}
	}

	/// Domain with the standard "SimplyPay" / "1.0" name and version.
	pub fn simplypay(chain_id: u64, verifying_contract: Address) -> Self {
		Self::new(PROTOCOL_NAME, PROTOCOL_VERSION, chain_id, verifying_contract)
	}

	/// `keccak256(0x19 0x01 || separator || struct_hash)`.
	pub fn digest(&self, struct_hash: &B256) -> B256 {
		compute_final_digest(&self.hash, struct_hash)
	}

	pub fn separator(&self) -> B256 {
		self.hash
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn version(&self) -> &str {
		&self.version
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	pub fn verifying_contract(&self) -> Address {
		self.verifying_contract
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use vault_types::{PaymentRequest, U256};

	#[test]
	fn test_separator_is_stable() {
		let a = DomainSeparator::simplypay(1, Address::repeat_byte(0x11));
		let b = DomainSeparator::simplypay(1, Address::repeat_byte(0x11));
		assert_eq!(a.separator(), b.separator());
		assert_eq!(a.name(), "SimplyPay");
		assert_eq!(a.version(), "1.0");
	}

	#[test]
	fn test_digest_depends_on_domain() {
		let request = PaymentRequest::new(
			Address::repeat_byte(0x01),
			U256::from(10u64),
			U256::from(1u64),
			U256::from(100u64),
		);
		let hash = request.struct_hash();

		let mainnet = DomainSeparator::simplypay(1, Address::repeat_byte(0x11));
		let other_chain = DomainSeparator::simplypay(5, Address::repeat_byte(0x11));
		let other_vault = DomainSeparator::simplypay(1, Address::repeat_byte(0x22));

		assert_ne!(mainnet.digest(&hash), other_chain.digest(&hash));
		assert_ne!(mainnet.digest(&hash), other_vault.digest(&hash));
	}
}
