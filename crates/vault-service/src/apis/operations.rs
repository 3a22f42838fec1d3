//! Mutating endpoints and signature verification.
//!
//! Each handler forwards to the engine and returns the committed
//! operation's receipt.

use axum::{extract::State, Json};
use vault_types::{
	APIError, DepositRequest, OperationResponse, TransactRequest, VerifyRequest, VerifyResponse,
	WithdrawRequest,
};

use super::api_error;
use crate::server::AppState;

/// Handles POST /api/deposit requests.
///
/// Only the signer's own allowance is ever pulled.
pub async fn deposit(
	State(state): State<AppState>,
	Json(request): Json<DepositRequest>,
) -> Result<Json<OperationResponse>, APIError> {
	match state
		.engine
		.deposit_with_authorization(&request.authorization, &request.signature)
		.await
	{
		Ok(receipt) => Ok(Json(receipt)),
		Err(e) => {
			tracing::warn!("Deposit request failed: {}", e);
			Err(api_error(e))
		},
	}
}

/// Handles POST /api/withdraw requests.
///
/// HTTP callers carry no identity, so withdrawals always go through a
/// signed authorization.
pub async fn withdraw(
	State(state): State<AppState>,
	Json(request): Json<WithdrawRequest>,
) -> Result<Json<OperationResponse>, APIError> {
	match state
		.engine
		.withdraw_with_authorization(&request.authorization, &request.signature)
		.await
	{
		Ok(receipt) => Ok(Json(receipt)),
		Err(e) => {
			tracing::warn!("Withdraw request failed: {}", e);
			Err(api_error(e))
		},
	}
}

/// Handles POST /api/transact requests.
pub async fn transact(
	State(state): State<AppState>,
	Json(request): Json<TransactRequest>,
) -> Result<Json<OperationResponse>, APIError> {
	match state
		.engine
		.transact(request.recipient, &request.request, &request.signature)
		.await
	{
		Ok(receipt) => Ok(Json(receipt)),
		Err(e) => {
			tracing::warn!("Transact request failed: {}", e);
			Err(api_error(e))
		},
	}
}

/// Handles POST /api/verify requests.
pub async fn verify(
	State(state): State<AppState>,
	Json(request): Json<VerifyRequest>,
) -> Json<VerifyResponse> {
	Json(VerifyResponse {
		valid: state
			.engine
			.verify_signature(&request.request, &request.signature),
	})
}
