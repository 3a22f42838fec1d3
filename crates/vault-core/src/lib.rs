//! Core of the SimplyPay vault.
//!
//! A custodial ledger over an external token plus the engine that executes
//! EIP-712 signed payment requests against it. The components, leaf first:
//! - [`domain`]: the signing domain and digest helper
//! - [`nonce`]: per-account replay protection
//! - [`verifier`]: signer recovery
//! - [`ledger`]: custodial balances
//! - [`engine`]: the serialized state machine tying them to the token and
//!   to persistence
//! - [`builder`]: assembly of an engine from configuration

pub mod builder;
pub mod domain;
pub mod engine;
pub mod ledger;
pub mod nonce;
pub mod verifier;

pub use builder::{BuilderError, VaultBuilder, VaultFactories};
pub use domain::DomainSeparator;
pub use engine::{event_bus::EventBus, state::VaultState, AuditReport, VaultEngine};
pub use ledger::{Ledger, LedgerError};
pub use nonce::{NonceError, NonceRegistry};
pub use verifier::{Secp256k1Verifier, SigError, Verifier};

use thiserror::Error;
use vault_storage::StorageError;
use vault_token::TokenError;

/// Rejections of a signed request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
	/// Recovery failed, or recovered someone other than the claimed sender.
	#[error("Signature is invalid")]
	InvalidSignature { cause: Option<SigError> },
	#[error("Request expired")]
	Expired,
	#[error("Invalid nonce")]
	StaleNonce(#[source] NonceError),
	/// The nonce was consumed before this check failed.
	#[error("Insufficient balance")]
	InsufficientBalance,
}

/// Error of any vault operation.
#[derive(Debug, Error)]
pub enum VaultError {
	#[error(transparent)]
	Ledger(#[from] LedgerError),
	#[error(transparent)]
	Auth(#[from] AuthError),
	#[error("Token transfer failed: {0}")]
	Token(#[from] TokenError),
	#[error("Unsupported action: {0}")]
	UnsupportedAction(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for VaultError {
	fn from(err: StorageError) -> Self {
		VaultError::Storage(err.to_string())
	}
}

/// Failure class of a [`VaultError`], for callers that react by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Malformed input; nothing was attempted.
	Validation,
	/// Signature, sender, expiry or nonce rejected.
	Authorization,
	InsufficientFunds,
	/// The token refused a pull or push; vault state was unwound.
	ExternalTransfer,
	/// A transfer was broadcast but not confirmed. The ledger assumes the
	/// tokens moved.
	Unconfirmed,
	Internal,
}

impl VaultError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			VaultError::Ledger(LedgerError::ZeroAmount) => ErrorKind::Validation,
			VaultError::Ledger(LedgerError::InsufficientBalance { .. }) => {
				ErrorKind::InsufficientFunds
			},
			VaultError::Ledger(LedgerError::Overflow) => ErrorKind::Internal,
			VaultError::Auth(AuthError::InvalidSignature {
				cause: Some(SigError::Malformed(_)),
			}) => ErrorKind::Validation,
			VaultError::Auth(AuthError::InsufficientBalance) => ErrorKind::InsufficientFunds,
			VaultError::Auth(_) => ErrorKind::Authorization,
			VaultError::Token(TokenError::Configuration(_)) => ErrorKind::Internal,
			VaultError::Token(TokenError::Unconfirmed { .. }) => ErrorKind::Unconfirmed,
			VaultError::Token(_) => ErrorKind::ExternalTransfer,
			VaultError::UnsupportedAction(_) => ErrorKind::Validation,
			VaultError::Storage(_) => ErrorKind::Internal,
		}
	}
}
