//! Signing domain endpoint.

use axum::{extract::State, Json};
use serde_json::{json, Value};
use vault_types::DomainResponse;

use crate::server::AppState;

/// EIP-712 `types` object for wallets' `eth_signTypedData_v4`.
fn typed_data_types() -> Value {
	json!({
		"EIP712Domain": [
			{ "name": "name", "type": "string" },
			{ "name": "version", "type": "string" },
			{ "name": "chainId", "type": "uint256" },
			{ "name": "verifyingContract", "type": "address" },
		],
		"PaymentRequest": [
			{ "name": "sender", "type": "address" },
			{ "name": "amount", "type": "uint256" },
			{ "name": "nonce", "type": "uint256" },
			{ "name": "expire", "type": "uint256" },
		],
		"Withdrawal": [
			{ "name": "action", "type": "string" },
			{ "name": "amount", "type": "uint256" },
			{ "name": "recipient", "type": "address" },
			{ "name": "nonce", "type": "uint256" },
		],
		"Deposit": [
			{ "name": "amount", "type": "uint256" },
			{ "name": "nonce", "type": "uint256" },
			{ "name": "expire", "type": "uint256" },
		],
	})
}

/// Handles GET /api/domain requests.
pub async fn get_domain(State(state): State<AppState>) -> Json<DomainResponse> {
	let domain = state.engine.domain();
	Json(DomainResponse {
		name: domain.name().to_string(),
		version: domain.version().to_string(),
		chain_id: domain.chain_id(),
		verifying_contract: domain.verifying_contract(),
		separator: domain.separator(),
		types: typed_data_types(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use vault_types::{DEPOSIT_TYPE, DOMAIN_TYPE, PAYMENT_REQUEST_TYPE, WITHDRAWAL_TYPE};

	/// Renders a type's field list the way EIP-712 encodes it.
	fn encode_type(name: &str, types: &Value) -> String {
		let fields: Vec<String> = types[name]
			.as_array()
			.unwrap()
			.iter()
			.map(|f| format!("{} {}", f["type"].as_str().unwrap(), f["name"].as_str().unwrap()))
			.collect();
		format!("{}({})", name, fields.join(","))
	}

	#[test]
	fn test_types_match_hashed_type_strings() {
		let types = typed_data_types();
		assert_eq!(encode_type("EIP712Domain", &types), DOMAIN_TYPE);
		assert_eq!(encode_type("PaymentRequest", &types), PAYMENT_REQUEST_TYPE);
		assert_eq!(encode_type("Withdrawal", &types), WITHDRAWAL_TYPE);
		assert_eq!(encode_type("Deposit", &types), DEPOSIT_TYPE);
	}
}
