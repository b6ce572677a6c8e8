use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("schema error: {0}")]
    Schema(String),
}

impl From<LmdbError> for docverify_store::StoreError {
    fn from(e: LmdbError) -> Self {
        use docverify_store::StoreError;
        match e {
            LmdbError::NotFound(key) => StoreError::NotFound(key),
            LmdbError::Serialization(e) => StoreError::Serialization(e.to_string()),
            LmdbError::Schema(msg) => StoreError::Corruption(msg),
            other => StoreError::Backend(other.to_string()),
        }
    }
}
