//! Signature recovery for the vault's typed messages.
//!
//! Recovery is behind the [`Verifier`] trait so the engine does not depend on
//! a particular signature scheme. The verifier only answers "who signed this
//! digest"; comparing the result with a claimed sender is the caller's job.

use crate::domain::DomainSeparator;
use alloy_primitives::PrimitiveSignature;
use thiserror::Error;
use vault_types::{
	Address, DepositAuthorization, PaymentRequest, WithdrawalAuthorization, B256, U256,
};

/// Half the secp256k1 group order. Signatures with a larger `s` are the
/// malleable twin of a low-s signature (EIP-2).
const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
	0xDFE92F46681B20A0,
	0x5D576E7357A4501D,
	0xFFFFFFFFFFFFFFFF,
	0x7FFFFFFFFFFFFFFF,
]);

const SIGNATURE_LENGTH: usize = 65;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigError {
	/// Not a 65-byte canonical `r || s || v` signature.
	#[error("Malformed signature: {0}")]
	Malformed(String),
	#[error("Signature recovery failed: {0}")]
	RecoveryFailed(String),
}

/// Recovers the signer of a digest.
pub trait Verifier: Send + Sync {
	fn recover(&self, digest: &B256, signature: &[u8]) -> Result<Address, SigError>;

	/// Signer of `request` under `domain`.
	fn verify_payment(
		&self,
		request: &PaymentRequest,
		signature: &[u8],
		domain: &DomainSeparator,
	) -> Result<Address, SigError> {
		self.recover(&domain.digest(&request.struct_hash()), signature)
	}

	/// Signer of `authorization` under `domain`.
	fn verify_withdrawal(
		&self,
		authorization: &WithdrawalAuthorization,
		signature: &[u8],
		domain: &DomainSeparator,
	) -> Result<Address, SigError> {
		self.recover(&domain.digest(&authorization.struct_hash()), signature)
	}

	/// Signer of a deposit `authorization` under `domain`.
	fn verify_deposit(
		&self,
		authorization: &DepositAuthorization,
		signature: &[u8],
		domain: &DomainSeparator,
	) -> Result<Address, SigError> {
		self.recover(&domain.digest(&authorization.struct_hash()), signature)
	}
}

/// ECDSA over secp256k1, as produced by Ethereum wallets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl Verifier for Secp256k1Verifier {
	fn recover(&self, digest: &B256, signature: &[u8]) -> Result<Address, SigError> {
		if signature.len() != SIGNATURE_LENGTH {
			return Err(SigError::Malformed(format!(
				"expected {} bytes, got {}",
				SIGNATURE_LENGTH,
				signature.len()
			)));
		}

		let sig = PrimitiveSignature::try_from(signature)
			.map_err(|e| SigError::Malformed(e.to_string()))?;
		if sig.s() > SECP256K1_N_DIV_2 {
			return Err(SigError::Malformed("high-s signature".to_string()));
		}

		let signer = sig
			.recover_address_from_prehash(digest)
			.map_err(|e| SigError::RecoveryFailed(e.to_string()))?;
		if signer == Address::ZERO {
			return Err(SigError::RecoveryFailed("recovered zero address".to_string()));
		}
		Ok(signer)
	}
}
