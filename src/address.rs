//! Recipient address validation
//!
//! Pure functions: no I/O, never panics. Anything that is not a canonical
//! base58 encoding of a 32-byte public key is classified invalid.

use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;

use crate::errors::TransferError;
use crate::types::ValidationReport;

/// Shortest base58 rendering of a 32-byte key
pub const MIN_ADDRESS_LEN: usize = 32;
/// Longest base58 rendering of a 32-byte key
pub const MAX_ADDRESS_LEN: usize = 44;

/// Decode `address` and check that it re-encodes to exactly the same text
fn decode_canonical(address: &str) -> Result<[u8; 32], String> {
    if !(MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&address.len()) {
        return Err(format!(
            "length {} outside {}..={}",
            address.len(),
            MIN_ADDRESS_LEN,
            MAX_ADDRESS_LEN
        ));
    }

    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| format!("not base58: {}", e))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| format!("decodes to {} bytes, expected 32", v.len()))?;

    if bs58::encode(bytes).into_string() != address {
        return Err("not in canonical encoding".to_string());
    }
    Ok(bytes)
}

/// True when `address` is a canonical base58 public key
pub fn is_valid_address(address: &str) -> bool {
    decode_canonical(address).is_ok()
}

/// Parse a recipient, naming the offending address on failure
pub fn parse_address(address: &str) -> Result<Pubkey, TransferError> {
    decode_canonical(address)
        .map(Pubkey::new_from_array)
        .map_err(|reason| TransferError::invalid_address(address, reason))
}

/// Split raw recipient lines into valid, invalid and duplicated addresses.
///
/// Lines are trimmed and blank lines dropped. An address seen more than once is
/// reported once in `duplicates` (first-seen order) and every occurrence is
/// left out of `valid` and `invalid`.
pub fn validate_addresses<S: AsRef<str>>(raw: &[S]) -> ValidationReport {
    let entries: Vec<&str> = raw
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|line| !line.is_empty())
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::with_capacity(entries.len());
    for entry in &entries {
        *counts.entry(*entry).or_insert(0) += 1;
    }

    let mut report = ValidationReport::default();
    for entry in entries {
        match counts.get(entry).copied() {
            Some(n) if n > 1 => {
                report.duplicates.push(entry.to_string());
                // Report each duplicate once
                counts.insert(entry, 0);
            }
            Some(0) => {}
            _ if is_valid_address(entry) => report.valid.push(entry.to_string()),
            _ => report.invalid.push(entry.to_string()),
        }
    }
    report
}
