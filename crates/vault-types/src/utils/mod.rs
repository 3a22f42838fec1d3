//! Utility functions for hashing, formatting and conversions.

pub mod conversion;
pub mod eip712;
pub mod formatting;
pub mod helpers;

pub use conversion::parse_address;
pub use eip712::{
	compute_domain_hash, compute_final_digest, Eip712AbiEncoder, DEPOSIT_TYPE, DOMAIN_TYPE,
	PAYMENT_REQUEST_TYPE, PROTOCOL_NAME, PROTOCOL_VERSION, WITHDRAWAL_TYPE, WITHDRAW_ACTION,
};
pub use formatting::{format_token_amount, truncate_id, with_0x_prefix, without_0x_prefix};
pub use helpers::current_timestamp;
