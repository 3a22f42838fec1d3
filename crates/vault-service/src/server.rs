//! HTTP server for the SimplyPay vault API.

use axum::{
	extract::DefaultBodyLimit,
	routing::{get, post},
	Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use vault_config::ApiConfig;
use vault_core::VaultEngine;

use crate::apis::{accounts, domain, operations};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Engine every handler operates on.
	pub engine: Arc<VaultEngine>,
}

/// Builds the `/api` router with its middleware.
pub fn router(api_config: &ApiConfig, engine: Arc<VaultEngine>) -> Router {
	let api = Router::new()
		.route("/domain", get(domain::get_domain))
		.route("/deposit", post(operations::deposit))
		.route("/withdraw", post(operations::withdraw))
		.route("/transact", post(operations::transact))
		.route("/verify", post(operations::verify))
		.route("/accounts/{address}", get(accounts::get_account))
		.route("/balances/{address}", get(accounts::get_balance))
		.route("/nonces/{address}", get(accounts::get_nonce))
		.route("/vault/balance", get(accounts::get_vault_balance))
		.route("/vault/audit", get(accounts::get_audit))
		.route("/receipts/{id}", get(accounts::get_receipt));

	Router::new()
		.nest("/api", api)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(AppState { engine })
}

/// Binds the configured address and serves the API until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<VaultEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(&api_config, engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("SimplyPay API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;
	use axum::body::Body;
	use axum::http::{Request, StatusCode};
	use serde_json::{json, Value};
	use tower::ServiceExt;
	use vault_config::builders::ConfigBuilder;
	use vault_core::{DomainSeparator, EventBus, VaultState};
	use vault_storage::{implementations::memory::MemoryStorage, StorageService};
	use vault_token::{implementations::memory::MemoryToken, TokenInterface, TokenService};
	use vault_types::{Address, DepositAuthorization, PaymentRequest, U256};

	const CUSTODIAN: Address = Address::repeat_byte(0xcc);

	struct TestApp {
		router: Router,
		token: MemoryToken,
		domain: DomainSeparator,
	}

	fn test_app() -> TestApp {
		let token = MemoryToken::new(CUSTODIAN, "USDT", 6);
		let domain = DomainSeparator::simplypay(31337, CUSTODIAN);
		let engine = VaultEngine::new(
			ConfigBuilder::new().build(),
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
			Arc::new(TokenService::new(Arc::new(token.clone()))),
			domain.clone(),
			VaultState::default(),
			EventBus::new(16),
		);
		let api_config = ApiConfig {
			enabled: true,
			host: "127.0.0.1".into(),
			port: 0,
			timeout_seconds: 5,
			max_request_size: 64 * 1024,
		};
		TestApp {
			router: router(&api_config, Arc::new(engine)),
			token,
			domain,
		}
	}

	async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		let request = Request::builder()
			.method(method)
			.uri(uri)
			.header("content-type", "application/json");
		let request = match body {
			Some(body) => request.body(Body::from(body.to_string())).unwrap(),
			None => request.body(Body::empty()).unwrap(),
		};
		let response = router.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
		(status, value)
	}

	fn hex_signature(signer: &PrivateKeySigner, digest: &vault_types::B256) -> String {
		let signature = signer.sign_hash_sync(digest).unwrap();
		format!("0x{}", alloy_primitives::hex::encode(signature.as_bytes()))
	}

	fn signed_deposit(app: &TestApp, signer: &PrivateKeySigner, amount: u64, nonce: u64) -> Value {
		let authorization = DepositAuthorization::new(
			U256::from(amount),
			U256::from(nonce),
			U256::from(u64::MAX),
		);
		let signature = hex_signature(signer, &app.domain.digest(&authorization.struct_hash()));
		json!({ "authorization": authorization, "signature": signature })
	}

	#[tokio::test]
	async fn test_domain_exposes_signing_parameters() {
		let app = test_app();
		let (status, body) = call(&app.router, "GET", "/api/domain", None).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["name"], "SimplyPay");
		assert_eq!(body["version"], "1.0");
		assert_eq!(body["chainId"], 31337);
		assert_eq!(body["types"]["PaymentRequest"][0]["name"], "sender");
		assert_eq!(body["types"]["Withdrawal"][0]["type"], "string");
		assert_eq!(body["types"]["Deposit"][0]["name"], "amount");
	}

	#[tokio::test]
	async fn test_deposit_then_pay() {
		let app = test_app();
		let payer = PrivateKeySigner::random();
		let merchant = Address::repeat_byte(0x4d);
		app.token.mint(payer.address(), U256::from(500u64)).await;
		app.token
			.approve(payer.address(), CUSTODIAN, U256::MAX)
			.await;

		let (status, receipt) = call(
			&app.router,
			"POST",
			"/api/deposit",
			Some(signed_deposit(&app, &payer, 500, 1)),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(receipt["event"]["type"], "Deposit");

		// Deposits and payments share one nonce sequence.
		let request = PaymentRequest::new(
			payer.address(),
			U256::from(200u64),
			U256::from(2u64),
			U256::from(u64::MAX),
		);
		let signature = hex_signature(&payer, &app.domain.digest(&request.struct_hash()));

		let (status, body) = call(
			&app.router,
			"POST",
			"/api/verify",
			Some(json!({ "request": request, "signature": signature })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["valid"], true);

		let (status, receipt) = call(
			&app.router,
			"POST",
			"/api/transact",
			Some(json!({ "request": request, "signature": signature, "recipient": merchant })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(receipt["event"]["type"], "PaymentSuccess");

		let (_, body) = call(
			&app.router,
			"GET",
			&format!("/api/accounts/{}", payer.address()),
			None,
		)
		.await;
		assert_eq!(body["balance"], "300");
		assert_eq!(body["nonce"], "2");

		let (_, body) = call(&app.router, "GET", &format!("/api/balances/{}", merchant), None).await;
		assert_eq!(body["balance"], "200");

		let id = receipt["id"].as_str().unwrap();
		let (status, stored) = call(&app.router, "GET", &format!("/api/receipts/{}", id), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(stored, receipt);

		// Replaying the same request is rejected.
		let (status, body) = call(
			&app.router,
			"POST",
			"/api/transact",
			Some(json!({ "request": request, "signature": signature, "recipient": merchant })),
		)
		.await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body["message"], "Invalid nonce");
	}

	#[tokio::test]
	async fn test_insufficient_balance_is_unprocessable() {
		let app = test_app();
		let payer = PrivateKeySigner::random();
		let request = PaymentRequest::new(
			payer.address(),
			U256::from(1u64),
			U256::from(1u64),
			U256::from(u64::MAX),
		);
		let signature = hex_signature(&payer, &app.domain.digest(&request.struct_hash()));

		let (status, body) = call(
			&app.router,
			"POST",
			"/api/transact",
			Some(json!({
				"request": request,
				"signature": signature,
				"recipient": Address::repeat_byte(1),
			})),
		)
		.await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"], "INSUFFICIENT_FUNDS");
		assert_eq!(body["message"], "Insufficient balance");
	}

	#[tokio::test]
	async fn test_deposit_without_allowance_is_bad_gateway() {
		let app = test_app();
		let depositor = PrivateKeySigner::random();
		let (status, body) = call(
			&app.router,
			"POST",
			"/api/deposit",
			Some(signed_deposit(&app, &depositor, 10, 1)),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_GATEWAY);
		assert_eq!(body["error"], "TOKEN_TRANSFER_FAILED");

		// The nonce is spent even though nothing moved.
		let (_, body) = call(
			&app.router,
			"GET",
			&format!("/api/nonces/{}", depositor.address()),
			None,
		)
		.await;
		assert_eq!(body["nonce"], "1");
	}

	#[tokio::test]
	async fn test_unsigned_deposit_for_other_account_is_rejected() {
		let app = test_app();
		let victim = Address::repeat_byte(0x71);
		app.token.mint(victim, U256::from(1_000u64)).await;
		app.token.approve(victim, CUSTODIAN, U256::MAX).await;

		let (status, _) = call(
			&app.router,
			"POST",
			"/api/deposit",
			Some(json!({ "account": victim, "amount": "1000" })),
		)
		.await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(app.token.balance_of(victim).await.unwrap(), U256::from(1_000u64));
		assert_eq!(app.token.balance_of(CUSTODIAN).await.unwrap(), U256::ZERO);
	}

	#[tokio::test]
	async fn test_signed_deposit_only_pulls_from_signer() {
		let app = test_app();
		let victim = Address::repeat_byte(0x71);
		let attacker = PrivateKeySigner::random();
		app.token.mint(victim, U256::from(1_000u64)).await;
		app.token.approve(victim, CUSTODIAN, U256::MAX).await;

		let (status, body) = call(
			&app.router,
			"POST",
			"/api/deposit",
			Some(signed_deposit(&app, &attacker, 1_000, 1)),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_GATEWAY);
		assert_eq!(body["error"], "TOKEN_TRANSFER_FAILED");
		assert_eq!(app.token.balance_of(victim).await.unwrap(), U256::from(1_000u64));

		let (_, body) = call(&app.router, "GET", &format!("/api/balances/{}", victim), None).await;
		assert_eq!(body["balance"], "0");
	}

	#[tokio::test]
	async fn test_short_signature_is_bad_request() {
		let app = test_app();
		let request = PaymentRequest::new(
			Address::repeat_byte(1),
			U256::from(1u64),
			U256::from(1u64),
			U256::from(u64::MAX),
		);
		let (status, body) = call(
			&app.router,
			"POST",
			"/api/transact",
			Some(json!({ "request": request, "signature": "0x1234", "recipient": Address::repeat_byte(2) })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["message"], "Signature is invalid");
	}

	#[tokio::test]
	async fn test_lookup_errors() {
		let app = test_app();
		let (status, body) = call(&app.router, "GET", "/api/balances/not-an-address", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_ADDRESS");

		let (status, _) = call(&app.router, "GET", "/api/receipts/unknown", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_vault_balance_and_audit() {
		let app = test_app();
		app.token.mint(CUSTODIAN, U256::from(1_500_000u64)).await;

		let (status, body) = call(&app.router, "GET", "/api/vault/balance", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["balance"], "1500000");
		assert_eq!(body["formatted"], "1.5 USDT");

		let (_, body) = call(&app.router, "GET", "/api/vault/audit", None).await;
		assert_eq!(body["solvent"], true);
	}
}
