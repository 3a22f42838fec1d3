//! Request handlers for the vault API.
//!
//! Handlers translate [`VaultError`]s into [`APIError`]s by failure class so
//! the user-visible message of every rejection reaches the client unchanged.

pub mod accounts;
pub mod domain;
pub mod operations;

use vault_core::{ErrorKind, LedgerError, VaultError};
use vault_token::TokenError;
use vault_types::{parse_address, APIError, Address};

pub(crate) fn api_error(err: VaultError) -> APIError {
	let message = err.to_string();
	match err.kind() {
		ErrorKind::Validation => APIError::BadRequest {
			error_type: "VALIDATION_ERROR".into(),
			message,
		},
		ErrorKind::Authorization => APIError::Unauthorized {
			error_type: "AUTHORIZATION_FAILED".into(),
			message,
		},
		ErrorKind::InsufficientFunds => {
			let details = match &err {
				VaultError::Ledger(LedgerError::InsufficientBalance { needed, available }) => {
					Some(serde_json::json!({
						"needed": needed.to_string(),
						"available": available.to_string(),
					}))
				},
				_ => None,
			};
			APIError::UnprocessableEntity {
				error_type: "INSUFFICIENT_FUNDS".into(),
				message,
				details,
			}
		},
		ErrorKind::ExternalTransfer => APIError::BadGateway {
			error_type: "TOKEN_TRANSFER_FAILED".into(),
			message,
		},
		ErrorKind::Unconfirmed => {
			let details = match &err {
				VaultError::Token(TokenError::Unconfirmed { tx_hash, .. }) => {
					Some(serde_json::json!({ "tx_hash": tx_hash }))
				},
				_ => None,
			};
			APIError::GatewayTimeout {
				error_type: "TRANSFER_UNCONFIRMED".into(),
				message,
				details,
			}
		},
		ErrorKind::Internal => {
			tracing::error!(error = %message, "Internal vault error");
			APIError::InternalServerError {
				error_type: "INTERNAL_ERROR".into(),
				message,
			}
		},
	}
}

/// Parses an address path segment.
pub(crate) fn path_address(raw: &str) -> Result<Address, APIError> {
	parse_address(raw).map_err(|message| APIError::BadRequest {
		error_type: "INVALID_ADDRESS".into(),
		message,
	})
}
