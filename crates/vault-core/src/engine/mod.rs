//! The payment authorization engine.
//!
//! Every mutating operation takes the state lock, stages its effects on a
//! copy, and commits the copy (persist, then swap) only when it has fully
//! succeeded. The one deliberate exception is nonce consumption: once a
//! signed request passes signature, sender and expiry checks its nonce stays
//! consumed even if a later step rejects it.
//!
//! Token movements that were broadcast but never confirmed are assumed to
//! have happened for pushes (the debit stays) and not to have happened for
//! pulls (nothing is credited), so the ledger never exceeds custody.

pub mod event_bus;
pub mod lifecycle;
pub mod state;

use crate::domain::DomainSeparator;
use crate::verifier::{Secp256k1Verifier, Verifier};
use crate::{AuthError, LedgerError, VaultError};
use serde::{Deserialize, Serialize};
use state::VaultState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::instrument;
use vault_config::Config;
use vault_storage::StorageService;
use vault_token::TokenService;
use vault_types::{
	current_timestamp, truncate_id, u256_serde, Account, Address, DepositAuthorization,
	PaymentRequest, Receipt, StorageKey, VaultEvent, WithdrawalAuthorization, U256,
	WITHDRAW_ACTION,
};

/// Source of the current UNIX time in seconds.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Solvency check of the ledger against the tokens actually in custody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
	#[serde(with = "u256_serde")]
	pub ledger_total: U256,
	#[serde(with = "u256_serde")]
	pub custody_balance: U256,
	/// `ledger_total <= custody_balance`
	pub solvent: bool,
}

/// The vault: ledger, nonces, signing domain and token, behind one lock.
#[derive(Clone)]
pub struct VaultEngine {
	config: Config,
	storage: Arc<StorageService>,
	token: Arc<TokenService>,
	verifier: Arc<dyn Verifier>,
	domain: DomainSeparator,
	state: Arc<Mutex<VaultState>>,
	event_bus: event_bus::EventBus,
	clock: Clock,
}

impl VaultEngine {
	/// Creates an engine over an already loaded state.
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		token: Arc<TokenService>,
		domain: DomainSeparator,
		state: VaultState,
		event_bus: event_bus::EventBus,
	) -> Self {
		Self {
			config,
			storage,
			token,
			verifier: Arc::new(Secp256k1Verifier),
			domain,
			state: Arc::new(Mutex::new(state)),
			event_bus,
			clock: Arc::new(current_timestamp),
		}
	}

	/// Replaces the signature verifier.
	pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
		self.verifier = verifier;
		self
	}

	/// Replaces the clock used for expiry checks and receipt timestamps.
	pub fn with_clock(mut self, clock: Clock) -> Self {
		self.clock = clock;
		self
	}

	/// Pulls `amount` from `account` into custody and credits it.
	///
	/// Unauthenticated: for operator tooling only, never exposed over HTTP.
	#[instrument(skip_all, fields(account = %account, amount = %amount))]
	pub async fn deposit(&self, account: Address, amount: U256) -> Result<Receipt, VaultError> {
		if amount.is_zero() {
			return Err(LedgerError::ZeroAmount.into());
		}

		let mut state = self.state.lock().await;
		self.pull_in(&mut state, account, amount).await?;
		drop(state);

		tracing::info!("Deposit committed");
		self.emit(VaultEvent::Deposit { account, amount }).await
	}

	/// Executes a signed deposit: pulls the amount from the signer's wallet
	/// and credits the signer.
	///
	/// The nonce is committed before the pull, so an authorization can move
	/// tokens at most once.
	#[instrument(skip_all, fields(nonce = %authorization.nonce, amount = %authorization.amount))]
	pub async fn deposit_with_authorization(
		&self,
		authorization: &DepositAuthorization,
		signature: &[u8],
	) -> Result<Receipt, VaultError> {
		if authorization.amount.is_zero() {
			return Err(LedgerError::ZeroAmount.into());
		}

		let signer = self
			.verifier
			.verify_deposit(authorization, signature, &self.domain)
			.map_err(|e| {
				tracing::warn!(error = %e, "Deposit signature rejected");
				AuthError::InvalidSignature { cause: Some(e) }
			})?;
		if !authorization.is_live_at((self.clock)()) {
			tracing::warn!(signer = %signer, expire = %authorization.expire, "Deposit authorization expired");
			return Err(AuthError::Expired.into());
		}

		let mut state = self.state.lock().await;
		let mut staged = state.clone();
		staged
			.nonces
			.consume(signer, authorization.nonce)
			.map_err(|e| {
				tracing::warn!(signer = %signer, error = %e, "Deposit nonce rejected");
				AuthError::StaleNonce(e)
			})?;
		self.commit(&mut state, staged).await?;
		self.pull_in(&mut state, signer, authorization.amount)
			.await?;
		drop(state);

		tracing::info!(signer = %signer, "Authorized deposit committed");
		self.emit(VaultEvent::Deposit {
			account: signer,
			amount: authorization.amount,
		})
		.await
	}

	/// Debits `account` and pushes `amount` back to it.
	#[instrument(skip_all, fields(account = %account, amount = %amount))]
	pub async fn withdraw(&self, account: Address, amount: U256) -> Result<Receipt, VaultError> {
		if amount.is_zero() {
			return Err(LedgerError::ZeroAmount.into());
		}

		let mut state = self.state.lock().await;
		let mut staged = state.clone();
		staged.ledger.debit(account, amount).inspect_err(|_| {
			tracing::warn!("Withdraw rejected: insufficient balance");
		})?;
		self.pay_out(&mut state, staged, account, account, amount)
			.await?;
		drop(state);

		tracing::info!("Withdraw committed");
		self.emit(VaultEvent::Withdraw { account, amount }).await
	}

	/// Executes a signed payment request, crediting `caller`.
	#[instrument(skip_all, fields(sender = %request.sender, recipient = %caller, nonce = %request.nonce))]
	pub async fn transact(
		&self,
		caller: Address,
		request: &PaymentRequest,
		signature: &[u8],
	) -> Result<Receipt, VaultError> {
		if request.amount.is_zero() {
			return Err(LedgerError::ZeroAmount.into());
		}

		let signer = self
			.verifier
			.verify_payment(request, signature, &self.domain)
			.map_err(|e| {
				tracing::warn!(error = %e, "Payment signature rejected");
				AuthError::InvalidSignature { cause: Some(e) }
			})?;
		if signer != request.sender {
			tracing::warn!(signer = %signer, "Payment signed by someone other than the sender");
			return Err(AuthError::InvalidSignature { cause: None }.into());
		}
		if !request.is_live_at((self.clock)()) {
			tracing::warn!(expire = %request.expire, "Payment request expired");
			return Err(AuthError::Expired.into());
		}

		let mut state = self.state.lock().await;
		let mut staged = state.clone();
		staged
			.nonces
			.consume(request.sender, request.nonce)
			.map_err(|e| {
				tracing::warn!(error = %e, "Payment nonce rejected");
				AuthError::StaleNonce(e)
			})?;

		if staged.ledger.balance_of(&request.sender) < request.amount {
			tracing::warn!("Payment rejected: insufficient balance, nonce consumed");
			self.commit(&mut state, staged).await?;
			return Err(AuthError::InsufficientBalance.into());
		}

		let mut transferred = staged.clone();
		if let Err(e) = transferred
			.ledger
			.transfer(request.sender, caller, request.amount)
		{
			tracing::warn!(error = %e, "Payment transfer rejected, nonce consumed");
			self.commit(&mut state, staged).await?;
			return Err(e.into());
		}
		self.commit(&mut state, transferred).await?;
		drop(state);

		tracing::info!(amount = %request.amount, "Payment committed");
		self.emit(VaultEvent::PaymentSuccess {
			sender: request.sender,
			recipient: caller,
		})
		.await
	}

	/// Executes a signed withdrawal of the signer's balance to the
	/// authorization's recipient.
	#[instrument(skip_all, fields(recipient = %authorization.recipient, nonce = %authorization.nonce))]
	pub async fn withdraw_with_authorization(
		&self,
		authorization: &WithdrawalAuthorization,
		signature: &[u8],
	) -> Result<Receipt, VaultError> {
		if authorization.action != WITHDRAW_ACTION {
			return Err(VaultError::UnsupportedAction(authorization.action.clone()));
		}
		if authorization.amount.is_zero() {
			return Err(LedgerError::ZeroAmount.into());
		}

		let signer = self
			.verifier
			.verify_withdrawal(authorization, signature, &self.domain)
			.map_err(|e| {
				tracing::warn!(error = %e, "Withdrawal signature rejected");
				AuthError::InvalidSignature { cause: Some(e) }
			})?;

		let mut state = self.state.lock().await;
		let mut staged = state.clone();
		staged
			.nonces
			.consume(signer, authorization.nonce)
			.map_err(|e| {
				tracing::warn!(signer = %signer, error = %e, "Withdrawal nonce rejected");
				AuthError::StaleNonce(e)
			})?;

		let mut debited = staged.clone();
		if let Err(e) = debited.ledger.debit(signer, authorization.amount) {
			tracing::warn!(signer = %signer, "Withdrawal rejected: insufficient balance, nonce consumed");
			self.commit(&mut state, staged).await?;
			return Err(e.into());
		}
		self.pay_out(
			&mut state,
			debited,
			signer,
			authorization.recipient,
			authorization.amount,
		)
		.await?;
		drop(state);

		tracing::info!(signer = %signer, amount = %authorization.amount, "Authorized withdrawal committed");
		self.emit(VaultEvent::WithdrawalAuthorized {
			signer,
			recipient: authorization.recipient,
			amount: authorization.amount,
		})
		.await
	}

	/// Whether `signature` is `request.sender`'s signature of `request`.
	///
	/// Pure: no nonce is consumed and expiry is not checked.
	pub fn verify_signature(&self, request: &PaymentRequest, signature: &[u8]) -> bool {
		self.verifier
			.verify_payment(request, signature, &self.domain)
			.map(|signer| signer == request.sender)
			.unwrap_or(false)
	}

	/// Last consumed nonce of `account`.
	pub async fn nonces(&self, account: Address) -> U256 {
		self.state.lock().await.nonces.current_nonce(&account)
	}

	/// Custodial balance of `account`.
	pub async fn balances(&self, account: Address) -> U256 {
		self.state.lock().await.ledger.balance_of(&account)
	}

	pub async fn account(&self, account: Address) -> Account {
		self.state.lock().await.account(&account)
	}

	/// Tokens held by the custodian address.
	pub async fn get_usdt_balance(&self) -> Result<U256, VaultError> {
		Ok(self.token.custody_balance().await?)
	}

	/// Compares the ledger total with the tokens in custody.
	pub async fn audit(&self) -> Result<AuditReport, VaultError> {
		let state = self.state.lock().await;
		let ledger_total = state.ledger_total();
		let custody_balance = self.token.custody_balance().await?;
		Ok(AuditReport {
			ledger_total,
			custody_balance,
			solvent: ledger_total <= custody_balance,
		})
	}

	/// A stored receipt, if it exists and has not expired.
	pub async fn receipt(&self, id: &str) -> Result<Option<Receipt>, VaultError> {
		Ok(self
			.storage
			.retrieve_optional(StorageKey::Receipts.as_str(), id)
			.await?)
	}

	pub fn domain(&self) -> &DomainSeparator {
		&self.domain
	}

	pub fn token(&self) -> &Arc<TokenService> {
		&self.token
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	/// Runs background duties until Ctrl+C: event logging and periodic
	/// storage cleanup.
	pub async fn run(&self) -> Result<(), VaultError> {
		let mut events = self.event_bus.subscribe();

		let storage = self.storage.clone();
		let mut cleanup_interval = tokio::time::interval(Duration::from_secs(
			self.config.storage.cleanup_interval_seconds,
		));
		let cleanup_handle = tokio::spawn(async move {
			loop {
				cleanup_interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {},
				}
			}
		});

		loop {
			tokio::select! {
				event = events.recv() => match event {
					Ok(receipt) => log_receipt(&receipt),
					Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Event logger lagged behind");
					},
					Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
				},

				_ = tokio::signal::ctrl_c() => {
					break;
				}
			}
		}

		cleanup_handle.abort();
		Ok(())
	}

	/// Pulls `amount` from `account` and commits the matching credit.
	///
	/// Nothing is credited unless the pull is confirmed. If the credit
	/// cannot be persisted the tokens are handed back.
	async fn pull_in(
		&self,
		state: &mut MutexGuard<'_, VaultState>,
		account: Address,
		amount: U256,
	) -> Result<(), VaultError> {
		let mut staged = (**state).clone();
		staged.ledger.credit(account, amount)?;

		if let Err(e) = self.token.pull(account, amount).await {
			if e.is_unconfirmed() {
				tracing::error!(account = %account, error = %e, "Deposit pull unconfirmed, nothing credited");
			} else {
				tracing::warn!(error = %e, "Deposit pull rejected");
			}
			return Err(e.into());
		}

		if let Err(e) = self.persist(&staged).await {
			if let Err(refund) = self.token.push(account, amount).await {
				tracing::error!(
					error = %e,
					refund_error = %refund,
					"Deposit could not be persisted or refunded"
				);
			}
			return Err(e);
		}
		**state = staged;
		Ok(())
	}

	/// Commits a debit already applied to `staged`, then pushes the tokens.
	///
	/// If the push definitely failed the debit is reverted; everything else
	/// staged (a consumed nonce) stays committed. An unconfirmed push keeps
	/// the debit, since the tokens may have left custody.
	async fn pay_out(
		&self,
		state: &mut MutexGuard<'_, VaultState>,
		staged: VaultState,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<(), VaultError> {
		self.commit(state, staged).await?;

		let e = match self.token.push(to, amount).await {
			Ok(()) => return Ok(()),
			Err(e) => e,
		};
		if e.is_unconfirmed() {
			tracing::error!(account = %from, error = %e, "Push unconfirmed, debit kept");
			return Err(e.into());
		}

		tracing::warn!(error = %e, "Push failed, reverting debit");
		let mut reverted = (**state).clone();
		// Cannot overflow: the amount was in this balance a moment ago.
		reverted.ledger.credit(from, amount)?;
		if let Err(persist_err) = self.persist(&reverted).await {
			// Live state keeps matching storage: the debit stands.
			tracing::error!(
				account = %from,
				push_error = %e,
				error = %persist_err,
				"Reverted debit could not be persisted"
			);
			return Err(persist_err);
		}
		**state = reverted;
		Err(e.into())
	}

	/// Persists `staged` and makes it the live state.
	async fn commit(
		&self,
		state: &mut MutexGuard<'_, VaultState>,
		staged: VaultState,
	) -> Result<(), VaultError> {
		self.persist(&staged).await?;
		**state = staged;
		Ok(())
	}

	async fn persist(&self, state: &VaultState) -> Result<(), VaultError> {
		state
			.persist(&self.storage, &self.config.vault.id)
			.await
			.map_err(|e| {
				tracing::error!(error = %e, "Failed to persist vault state");
				VaultError::from(e)
			})
	}

	/// Records and publishes the receipt of a committed operation.
	///
	/// The operation is already committed, so a storage failure here is
	/// logged rather than returned.
	async fn emit(&self, event: VaultEvent) -> Result<Receipt, VaultError> {
		let receipt = Receipt {
			id: uuid::Uuid::new_v4().to_string(),
			event,
			timestamp: (self.clock)(),
		};
		if let Err(e) = self
			.storage
			.store(StorageKey::Receipts.as_str(), &receipt.id, &receipt)
			.await
		{
			tracing::warn!(receipt_id = %receipt.id, error = %e, "Failed to store receipt");
		}
		self.event_bus.publish(receipt.clone());
		Ok(receipt)
	}
}

fn log_receipt(receipt: &Receipt) {
	let id = truncate_id(&receipt.id);
	match &receipt.event {
		VaultEvent::Deposit { account, amount } => {
			tracing::info!(receipt = %id, account = %account, amount = %amount, "Deposit");
		},
		VaultEvent::Withdraw { account, amount } => {
			tracing::info!(receipt = %id, account = %account, amount = %amount, "Withdraw");
		},
		VaultEvent::PaymentSuccess { sender, recipient } => {
			tracing::info!(receipt = %id, sender = %sender, recipient = %recipient, "PaymentSuccess");
		},
		VaultEvent::WithdrawalAuthorized {
			signer,
			recipient,
			amount,
		} => {
			tracing::info!(
				receipt = %id,
				signer = %signer,
				recipient = %recipient,
				amount = %amount,
				"WithdrawalAuthorized"
			);
		},
	}
}
