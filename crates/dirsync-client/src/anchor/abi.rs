//! Minimal Solidity ABI codec for the root-CID registry.
//!
//! The registry contract exposes:
//!
//! ```solidity
//! function getRootCID() external view returns (string memory);
//! function setRootCID(string memory rootCID) external;
//! function getOwner() external view returns (address);
//! event RootCIDSet(string rootCID);
//! ```
//!
//! Only the shapes those functions need are implemented: zero-argument calls,
//! a single dynamic `string` argument, and `string`/`address` return values.

use thiserror::Error;

/// `keccak256("getRootCID()")[..4]`
pub const GET_ROOT_CID_SELECTOR: &str = "ea373564";
/// `keccak256("setRootCID(string)")[..4]`
pub const SET_ROOT_CID_SELECTOR: &str = "7c0cf836";
/// `keccak256("getOwner()")[..4]`
pub const GET_OWNER_SELECTOR: &str = "893d20e8";

const WORD: usize = 32;

/// ABI decoding failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("return data is not hex: {0}")]
    Hex(String),
    #[error("return data truncated: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
    #[error("ABI word does not fit in usize")]
    Overflow,
    #[error("string is not valid UTF-8")]
    Utf8,
}

/// Calldata for a zero-argument function.
pub fn encode_call(selector: &str) -> String {
    format!("0x{selector}")
}

/// Calldata for a function taking one `string` argument.
///
/// Layout: selector, offset word (0x20), length word, UTF-8 bytes
/// right-padded to a word boundary.
pub fn encode_string_call(selector: &str, value: &str) -> String {
    let bytes = value.as_bytes();
    let padded_len = bytes.len().div_ceil(WORD) * WORD;
    let mut data = Vec::with_capacity(2 * WORD + padded_len);
    data.extend_from_slice(&usize_word(WORD));
    data.extend_from_slice(&usize_word(bytes.len()));
    data.extend_from_slice(bytes);
    data.resize(2 * WORD + padded_len, 0);
    format!("0x{selector}{}", hex::encode(data))
}

/// Decode `eth_call` return data holding a single `string`.
pub fn decode_string(return_data: &str) -> Result<String, AbiError> {
    let data = decode_hex(return_data)?;
    let offset = read_usize(&data, 0)?;
    let len = read_usize(&data, offset)?;
    let start = offset.checked_add(WORD).ok_or(AbiError::Overflow)?;
    let end = start.checked_add(len).ok_or(AbiError::Overflow)?;
    let bytes = data.get(start..end).ok_or(AbiError::Truncated {
        needed: end,
        got: data.len(),
    })?;
    String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::Utf8)
}

/// Decode `eth_call` return data holding a single `address`.
pub fn decode_address(return_data: &str) -> Result<String, AbiError> {
    let data = decode_hex(return_data)?;
    let word = read_word(&data, 0)?;
    Ok(format!("0x{}", hex::encode(&word[12..])))
}

fn decode_hex(value: &str) -> Result<Vec<u8>, AbiError> {
    let stripped = value.trim().trim_start_matches("0x");
    hex::decode(stripped).map_err(|e| AbiError::Hex(e.to_string()))
}

fn usize_word(value: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    let be = (value as u64).to_be_bytes();
    word[WORD - be.len()..].copy_from_slice(&be);
    word
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8], AbiError> {
    let end = at.checked_add(WORD).ok_or(AbiError::Overflow)?;
    data.get(at..end).ok_or(AbiError::Truncated {
        needed: end,
        got: data.len(),
    })
}

fn read_usize(data: &[u8], at: usize) -> Result<usize, AbiError> {
    let word = read_word(data, at)?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow);
    }
    let mut be = [0u8; 8];
    be.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(be)).map_err(|_| AbiError::Overflow)
}

/// Render a quantity the way JSON-RPC expects (`0x`-prefixed, no leading zeros).
pub fn to_quantity(value: u128) -> String {
    format!("0x{value:x}")
}

/// Parse a JSON-RPC quantity.
pub fn parse_quantity(value: &str) -> Option<u64> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16).ok()
}
