//! Common types for the SimplyPay vault.
//!
//! Shared data structures used by every vault crate: the signed payment
//! messages, emitted events, HTTP request/response shapes, storage keys and
//! the configuration validation framework.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Events emitted by the vault after committed operations.
pub mod events;
/// Signed messages: payment requests and withdrawal authorizations.
pub mod payment;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Secure string type for key material.
pub mod secret_string;
/// Storage types for managing persistent data.
pub mod storage;
/// Utility functions for hashing, formatting and time.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use api::*;
pub use events::*;
pub use payment::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use storage::*;
pub use utils::{
	compute_domain_hash, compute_final_digest, current_timestamp, format_token_amount,
	parse_address, truncate_id, with_0x_prefix, without_0x_prefix, Eip712AbiEncoder,
	DEPOSIT_TYPE, DOMAIN_TYPE, PAYMENT_REQUEST_TYPE, PROTOCOL_NAME, PROTOCOL_VERSION, WITHDRAWAL_TYPE,
	WITHDRAW_ACTION,
};
pub use validation::*;
