//! Minimal Ethereum ABI encoding for the reward contract surface.
//!
//! Calldata is a 4-byte selector (first bytes of the Keccak-256 of the
//! canonical signature) followed by 32-byte words. Dynamic arguments
//! (`string`) are encoded as an offset in the head and a length-prefixed,
//! zero-padded tail.

use sha3::{Digest, Keccak256};
use srt_types::{LedgerAddress, U256};

use crate::LedgerError;

pub const WORD: usize = 32;

pub const REWARD_SENSOR: &str = "rewardSensor(address,string)";
pub const GET_SENSOR_STATS: &str = "getSensorStats(address)";
pub const BALANCE_OF: &str = "balanceOf(address)";
pub const TOTAL_SUPPLY: &str = "totalSupply()";
pub const REWARD_PER_MESSAGE: &str = "rewardPerMessage()";

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn uint_word(value: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    U256::from(value).to_big_endian(&mut word);
    word
}

/// Calldata for a function with no arguments.
pub fn encode_call(signature: &str) -> Vec<u8> {
    selector(signature).to_vec()
}

/// Calldata for a function taking a single `address`.
pub fn encode_address_call(signature: &str, address: &LedgerAddress) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&address.to_word());
    data
}

/// Calldata for `rewardSensor(address,string)`.
pub fn encode_reward_sensor(wallet: &LedgerAddress, sensor_id: &str) -> Vec<u8> {
    let bytes = sensor_id.as_bytes();
    let padded_len = bytes.len().div_ceil(WORD) * WORD;
    let mut data = Vec::with_capacity(4 + 3 * WORD + padded_len);
    data.extend_from_slice(&selector(REWARD_SENSOR));
    data.extend_from_slice(&wallet.to_word());
    // Head is two words, so the string tail starts at 0x40.
    data.extend_from_slice(&uint_word(2 * WORD));
    data.extend_from_slice(&uint_word(bytes.len()));
    data.extend_from_slice(bytes);
    data.resize(4 + 3 * WORD + padded_len, 0);
    data
}

/// Decode `count` leading `uint256` words from call return data.
pub fn decode_uints(data: &[u8], count: usize) -> Result<Vec<U256>, LedgerError> {
    if data.len() < count * WORD {
        return Err(LedgerError::Abi(format!(
            "expected {} bytes of return data, got {}",
            count * WORD,
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(WORD)
        .take(count)
        .map(U256::from_big_endian)
        .collect())
}

/// Decode `0x`-prefixed hex return data.
pub fn decode_hex_data(raw: &str) -> Result<Vec<u8>, LedgerError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits).map_err(|e| LedgerError::Abi(format!("invalid hex data: {e}")))
}
