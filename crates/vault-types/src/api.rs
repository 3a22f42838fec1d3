//! API types for the vault HTTP surface.
//!
//! Request and response bodies for the `/api` endpoints, the structured
//! error type handlers return, and the serde helpers that put amounts on the
//! wire as decimal strings.

use crate::events::Receipt;
use crate::payment::{DepositAuthorization, PaymentRequest, WithdrawalAuthorization};
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /api/deposit`.
///
/// The signer of `authorization` is the account whose allowance is pulled
/// and whose balance is credited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
	pub authorization: DepositAuthorization,
	pub signature: Bytes,
}

/// Body of `POST /api/transact`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactRequest {
	pub request: PaymentRequest,
	/// 65-byte `r || s || v` signature, hex encoded.
	pub signature: Bytes,
	/// Account credited with the payment.
	pub recipient: Address,
}

/// Body of `POST /api/withdraw`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
	pub authorization: WithdrawalAuthorization,
	pub signature: Bytes,
}

/// Body of `POST /api/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
	pub request: PaymentRequest,
	pub signature: Bytes,
}

/// Response of `POST /api/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
	pub valid: bool,
}

/// Response of `GET /api/accounts/{address}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
	pub address: Address,
	#[serde(with = "u256_serde")]
	pub balance: U256,
	#[serde(with = "u256_serde")]
	pub nonce: U256,
}

/// Response of `GET /api/balances/{address}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
	pub address: Address,
	#[serde(with = "u256_serde")]
	pub balance: U256,
}

/// Response of `GET /api/nonces/{address}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceResponse {
	pub address: Address,
	#[serde(with = "u256_serde")]
	pub nonce: U256,
}

/// Response of `GET /api/vault/balance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultBalanceResponse {
	/// Address holding the custodied tokens.
	pub custodian: Address,
	#[serde(with = "u256_serde")]
	pub balance: U256,
	/// Human readable balance using the configured token decimals.
	pub formatted: String,
}

/// Response of `GET /api/domain`.
///
/// Everything a client needs to produce a signature the vault accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainResponse {
	pub name: String,
	pub version: String,
	pub chain_id: u64,
	pub verifying_contract: Address,
	pub separator: B256,
	/// EIP-712 type definitions keyed by primary type name.
	pub types: serde_json::Value,
}

/// Response of every mutating endpoint.
pub type OperationResponse = Receipt;

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed input (400)
	BadRequest { error_type: String, message: String },
	/// Signature, expiry or nonce rejected (401)
	Unauthorized { error_type: String, message: String },
	/// Unknown resource (404)
	NotFound { error_type: String, message: String },
	/// Business rule failure such as insufficient balance (422)
	UnprocessableEntity {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// The external token rejected a transfer (502)
	BadGateway { error_type: String, message: String },
	/// A transfer was sent but its outcome is unknown (504)
	GatewayTimeout {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Internal failure (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::Unauthorized { .. } => 401,
			APIError::NotFound { .. } => 404,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::BadGateway { .. } => 502,
			APIError::GatewayTimeout { .. } => 504,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details) = match self {
			APIError::BadRequest {
				error_type,
				message,
			}
			| APIError::Unauthorized {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::BadGateway {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type, message, None),
			APIError::UnprocessableEntity {
				error_type,
				message,
				details,
			}
			| APIError::GatewayTimeout {
				error_type,
				message,
				details,
			} => (error_type, message, details.clone()),
		};
		ErrorResponse {
			error: error.clone(),
			message: message.clone(),
			details,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let response = self.to_error_response();
		write!(f, "{} ({}): {}", response.error, self.status_code(), response.message)
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}

/// Serde module for U256 amounts.
///
/// Serializes as a decimal string. Deserializes from a decimal string, a
/// `0x`-prefixed hex string or a JSON integer, since wallets disagree on
/// which of these to send.
pub mod u256_serde {
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Repr {
		Text(String),
		Number(u64),
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Repr::deserialize(deserializer)? {
			Repr::Number(n) => Ok(U256::from(n)),
			Repr::Text(s) => {
				let s = s.trim();
				match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
					Some(hex) => U256::from_str_radix(hex, 16).map_err(D::Error::custom),
					None => U256::from_str_radix(s, 10).map_err(D::Error::custom),
				}
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_codes() {
		let err = APIError::UnprocessableEntity {
			error_type: "INSUFFICIENT_FUNDS".into(),
			message: "Insufficient balance".into(),
			details: None,
		};
		assert_eq!(err.status_code(), 422);
		assert_eq!(err.to_error_response().message, "Insufficient balance");

		let err = APIError::Unauthorized {
			error_type: "AUTHORIZATION".into(),
			message: "Signature is invalid".into(),
		};
		assert_eq!(err.status_code(), 401);
	}

	#[test]
	fn test_deposit_request_parsing() {
		let body = r#"{"authorization":{"amount":"100000000000","nonce":1,"expire":"0x6553f100"},"signature":"0x1234"}"#;
		let request: DepositRequest = serde_json::from_str(body).unwrap();
		assert_eq!(request.authorization.amount, U256::from(100_000_000_000u64));
		assert_eq!(request.authorization.expire, U256::from(0x6553f100u64));
		assert_eq!(request.signature.len(), 2);
	}

	#[test]
	fn test_deposit_request_requires_authorization() {
		let body = r#"{"account":"0x70997970c51812dc3a010c7d01b50e0d17dc79c8","amount":"100"}"#;
		assert!(serde_json::from_str::<DepositRequest>(body).is_err());
	}

	#[test]
	fn test_u256_rejects_garbage() {
		let body = r#"{"amount":"12abc","nonce":1,"expire":1}"#;
		assert!(serde_json::from_str::<DepositAuthorization>(body).is_err());
		let body = r#"{"amount":-5,"nonce":1,"expire":1}"#;
		assert!(serde_json::from_str::<DepositAuthorization>(body).is_err());
	}

	#[test]
	fn test_gateway_timeout_keeps_details() {
		let err = APIError::GatewayTimeout {
			error_type: "TRANSFER_UNCONFIRMED".into(),
			message: "not confirmed".into(),
			details: Some(serde_json::json!({ "tx_hash": "0xab" })),
		};
		assert_eq!(err.status_code(), 504);
		assert_eq!(err.to_error_response().details.unwrap()["tx_hash"], "0xab");
	}
}
