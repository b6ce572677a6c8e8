use docverify_store::StoreError;
use docverify_types::{DocumentId, VerificationId};
use thiserror::Error;

/// An infrastructure fault while evaluating a step.
///
/// A check that runs and comes back negative is not an error; it is a
/// [`StepOutcome`](crate::StepOutcome) with `result: false`.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    #[error("step timed out after {0} ms")]
    Timeout(u64),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),

    #[error("verification {0} not found")]
    VerificationNotFound(VerificationId),

    #[error("verification {0} already has a running drive loop")]
    AlreadyRunning(VerificationId),

    #[error("orchestrator is shutting down")]
    ShuttingDown,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
