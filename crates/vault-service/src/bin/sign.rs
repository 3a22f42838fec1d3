//! Off-chain signer for SimplyPay messages.
//!
//! Builds a `PaymentRequest`, `Withdrawal` or `Deposit` for a private key, signs it
//! under the vault's domain and prints `{ request, signature, digest }` as
//! JSON, ready to post to the vault API. The domain and next nonce can be
//! given on the command line or fetched from a running vault with `--api`.

use clap::{Parser, Subcommand};
use serde_json::json;
use thiserror::Error;
use vault_account::{implementations::local::LocalAccount, AccountService};
use vault_core::DomainSeparator;
use vault_types::{
	current_timestamp, parse_address, Address, DepositAuthorization, DomainResponse,
	NonceResponse, PaymentRequest, SecretString, WithdrawalAuthorization, U256,
};

const DEFAULT_TTL_SECONDS: u64 = 300;

#[derive(Debug, Error)]
enum SignError {
	#[error("Account error: {0}")]
	Account(#[from] vault_account::AccountError),
	#[error("Vault API error: {0}")]
	Api(#[from] reqwest::Error),
	#[error("Missing parameter: {0}")]
	Missing(&'static str),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Sign SimplyPay payment requests, withdrawals and deposits")]
struct Args {
	/// Signer's private key, hex encoded
	#[arg(long, env = "SIMPLYPAY_SIGNER_KEY", hide_env_values = true)]
	private_key: String,

	/// Base URL of a running vault; supplies the domain and next nonce
	#[arg(long)]
	api: Option<String>,

	/// Chain id of the signing domain
	#[arg(long, default_value_t = 31337)]
	chain_id: u64,

	/// Verifying contract of the signing domain
	#[arg(long, value_parser = parse_address)]
	verifying_contract: Option<Address>,

	/// Nonce to sign; defaults to the vault's current nonce plus one
	#[arg(long, value_parser = parse_amount)]
	nonce: Option<U256>,

	#[command(subcommand)]
	message: Message,
}

#[derive(Subcommand, Debug)]
enum Message {
	/// Sign a PaymentRequest from the signer's balance
	Payment {
		/// Amount in the token's smallest unit
		#[arg(long, value_parser = parse_amount)]
		amount: U256,
		/// Seconds from now until the request expires
		#[arg(long, default_value_t = DEFAULT_TTL_SECONDS)]
		ttl: u64,
	},
	/// Sign a Withdrawal of the signer's balance to a recipient
	Withdraw {
		#[arg(long, value_parser = parse_amount)]
		amount: U256,
		#[arg(long, value_parser = parse_address)]
		recipient: Address,
	},
	/// Sign a Deposit letting the vault pull from the signer's allowance
	Deposit {
		#[arg(long, value_parser = parse_amount)]
		amount: U256,
		#[arg(long, default_value_t = DEFAULT_TTL_SECONDS)]
		ttl: u64,
	},
}

fn parse_amount(value: &str) -> Result<U256, String> {
	let value = value.trim();
	match value.strip_prefix("0x") {
		Some(hex) => U256::from_str_radix(hex, 16),
		None => U256::from_str_radix(value, 10),
	}
	.map_err(|e| format!("Invalid amount '{}': {}", value, e))
}

/// Domain and nonce for the message, from the API when one is given.
async fn resolve_context(
	args: &Args,
	signer: Address,
) -> Result<(DomainSeparator, U256), SignError> {
	let Some(api) = args.api.as_deref() else {
		let verifying_contract = args
			.verifying_contract
			.ok_or(SignError::Missing("--verifying-contract (or --api)"))?;
		let nonce = args.nonce.ok_or(SignError::Missing("--nonce (or --api)"))?;
		return Ok((
			DomainSeparator::simplypay(args.chain_id, verifying_contract),
			nonce,
		));
	};

	let api = api.trim_end_matches('/');
	let client = reqwest::Client::new();
	let domain: DomainResponse = client
		.get(format!("{}/api/domain", api))
		.send()
		.await?
		.error_for_status()?
		.json()
		.await?;
	let nonce = match args.nonce {
		Some(nonce) => nonce,
		None => {
			let current: NonceResponse = client
				.get(format!("{}/api/nonces/{}", api, signer))
				.send()
				.await?
				.error_for_status()?
				.json()
				.await?;
			current.nonce + U256::from(1u64)
		},
	};

	Ok((
		DomainSeparator::new(
			domain.name,
			domain.version,
			domain.chain_id,
			domain.verifying_contract,
		),
		nonce,
	))
}

async fn sign(args: Args) -> Result<serde_json::Value, SignError> {
	let account = AccountService::new(Box::new(LocalAccount::new(&SecretString::from(
		args.private_key.as_str(),
	))?));
	let signer = account.get_address().await?;
	let (domain, nonce) = resolve_context(&args, signer).await?;

	let (request, struct_hash) = match args.message {
		Message::Payment { amount, ttl } => {
			let request = PaymentRequest::new(
				signer,
				amount,
				nonce,
				U256::from(current_timestamp().saturating_add(ttl)),
			);
			let hash = request.struct_hash();
			(json!(request), hash)
		},
		Message::Withdraw { amount, recipient } => {
			let authorization = WithdrawalAuthorization::new(amount, recipient, nonce);
			let hash = authorization.struct_hash();
			(json!(authorization), hash)
		},
		Message::Deposit { amount, ttl } => {
			let authorization = DepositAuthorization::new(
				amount,
				nonce,
				U256::from(current_timestamp().saturating_add(ttl)),
			);
			let hash = authorization.struct_hash();
			(json!(authorization), hash)
		},
	};

	let digest = domain.digest(&struct_hash);
	let signature = account.sign_hash(&digest).await?;

	Ok(json!({
		"request": request,
		"signature": signature,
		"digest": digest,
	}))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let output = sign(Args::parse()).await?;
	println!("{}", serde_json::to_string_pretty(&output)?);
	Ok(())
}
