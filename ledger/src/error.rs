use std::time::Duration;

use srt_types::{AddressError, TxHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash },

    #[error("no receipt for {tx_hash} after {waited:?}")]
    ReceiptTimeout { tx_hash: TxHash, waited: Duration },

    #[error("gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("invalid address for {context}: {source}")]
    InvalidAddress {
        context: String,
        #[source]
        source: AddressError,
    },

    #[error("deployment descriptor: {0}")]
    Deployment(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        LedgerError::Transport(e.to_string())
    }
}
