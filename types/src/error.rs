//! Error types shared across crates.

use thiserror::Error;

/// An inbound telemetry payload could not be turned into a [`crate::Reading`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("payload is not valid telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("required field is empty: {0}")]
    EmptyField(&'static str),

    #[error("value is not a finite number")]
    NonFiniteValue,
}

/// A ledger address string was malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),

    #[error("address must be 20 bytes (40 hex chars), got {0} chars")]
    InvalidLength(usize),

    #[error("address contains non-hex characters: {0}")]
    InvalidHex(String),
}
