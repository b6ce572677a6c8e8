use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("store error: {0}")]
    Store(#[from] docverify_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] docverify_store_lmdb::LmdbError),

    #[error("verification error: {0}")]
    Verification(#[from] docverify_verification::VerificationError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node not started")]
    NotStarted,
}
