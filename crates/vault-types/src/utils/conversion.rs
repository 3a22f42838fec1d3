//! Parsing helpers for values arriving as strings (config files, URL paths).

use alloy_primitives::Address;

/// Parses a hex address with or without the `0x` prefix.
///
/// Checksums are not enforced; mixed-case input is accepted as-is.
pub fn parse_address(value: &str) -> Result<Address, String> {
	let trimmed = value.trim();
	let hex_part = super::without_0x_prefix(trimmed);
	if hex_part.len() != 40 {
		return Err(format!(
			"Invalid address length: expected 40 hex characters, got {}",
			hex_part.len()
		));
	}
	let bytes = hex::decode(hex_part).map_err(|e| format!("Invalid address hex: {}", e))?;
	Ok(Address::from_slice(&bytes))
}
