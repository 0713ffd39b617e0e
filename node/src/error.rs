use thiserror::Error;

/// Startup and lifecycle failures. Per-message failures never surface here.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] srt_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] srt_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] srt_store_lmdb::LmdbError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket server error: {0}")]
    WebSocket(String),

    #[error("node already started")]
    AlreadyStarted,
}
