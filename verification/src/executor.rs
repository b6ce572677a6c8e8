//! Pluggable step execution.
//!
//! The orchestrator knows nothing about what a check actually does. It hands
//! a step name and the document under verification to a [`StepExecutor`] and
//! records whatever comes back.

use async_trait::async_trait;
use docverify_store::Document;
use docverify_types::{StepName, VerificationId};

use crate::ExecutorError;

/// What a step is evaluated against.
#[derive(Clone, Debug)]
pub struct StepContext {
    pub verification_id: VerificationId,
    pub document: Document,
}

/// Business outcome of one check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    pub result: bool,
    pub details: String,
}

impl StepOutcome {
    pub fn pass(step: StepName) -> Self {
        Self {
            result: true,
            details: format!("{step} completed successfully"),
        }
    }

    pub fn fail(step: StepName) -> Self {
        Self {
            result: false,
            details: format!("{step} failed verification"),
        }
    }
}

/// Runs a single named verification step.
///
/// A negative check is a valid outcome (`Ok` with `result: false`). `Err` is
/// reserved for infrastructure faults that prevented the check from running;
/// the orchestrator retries those.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(
        &self,
        step: StepName,
        ctx: &StepContext,
    ) -> Result<StepOutcome, ExecutorError>;
}
