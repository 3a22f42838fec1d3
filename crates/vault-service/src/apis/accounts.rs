//! Read-only account, custody and receipt lookups.

use axum::{
	extract::{Path, State},
	Json,
};
use vault_core::AuditReport;
use vault_types::{
	APIError, AccountResponse, BalanceResponse, NonceResponse, Receipt, VaultBalanceResponse,
};

use super::{api_error, path_address};
use crate::server::AppState;

/// Handles GET /api/accounts/{address} requests.
pub async fn get_account(
	Path(address): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<AccountResponse>, APIError> {
	let address = path_address(&address)?;
	let account = state.engine.account(address).await;
	Ok(Json(AccountResponse {
		address,
		balance: account.balance,
		nonce: account.nonce,
	}))
}

/// Handles GET /api/balances/{address} requests.
pub async fn get_balance(
	Path(address): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, APIError> {
	let address = path_address(&address)?;
	Ok(Json(BalanceResponse {
		address,
		balance: state.engine.balances(address).await,
	}))
}

/// Handles GET /api/nonces/{address} requests.
///
/// The next request from this address must carry `nonce + 1`.
pub async fn get_nonce(
	Path(address): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<NonceResponse>, APIError> {
	let address = path_address(&address)?;
	Ok(Json(NonceResponse {
		address,
		nonce: state.engine.nonces(address).await,
	}))
}

/// Handles GET /api/vault/balance requests.
pub async fn get_vault_balance(
	State(state): State<AppState>,
) -> Result<Json<VaultBalanceResponse>, APIError> {
	let balance = state.engine.get_usdt_balance().await.map_err(api_error)?;
	let token = state.engine.token();
	Ok(Json(VaultBalanceResponse {
		custodian: token.custodian(),
		balance,
		formatted: token.format(balance),
	}))
}

/// Handles GET /api/vault/audit requests.
pub async fn get_audit(State(state): State<AppState>) -> Result<Json<AuditReport>, APIError> {
	let report = state.engine.audit().await.map_err(api_error)?;
	if !report.solvent {
		tracing::warn!(
			ledger_total = %report.ledger_total,
			custody_balance = %report.custody_balance,
			"Audit found a custody shortfall"
		);
	}
	Ok(Json(report))
}

/// Handles GET /api/receipts/{id} requests.
pub async fn get_receipt(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Receipt>, APIError> {
	match state.engine.receipt(&id).await.map_err(api_error)? {
		Some(receipt) => Ok(Json(receipt)),
		None => Err(APIError::NotFound {
			error_type: "RECEIPT_NOT_FOUND".into(),
			message: format!("Receipt not found: {}", id),
		}),
	}
}
