use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("record {0} is terminal and can no longer be modified")]
    Immutable(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}

impl StoreError {
    /// Whether retrying the same operation could plausibly succeed.
    ///
    /// Only backend faults (I/O, map full, lock contention) qualify; missing
    /// or immutable records and undecodable data will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}
