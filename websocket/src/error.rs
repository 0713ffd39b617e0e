use thiserror::Error;

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("WebSocket server I/O error: {0}")]
    Io(#[from] std::io::Error),
}
