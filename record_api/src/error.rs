use thiserror::Error;

/// Failures reported by a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid record path `{0}`")]
    InvalidPath(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("write rejected: {0}")]
    Rejected(String),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage backend failed: {0}")]
    Backend(String),
}
