//! Span constructors for verification work.

use docverify_types::{StepName, VerificationId};
use tracing::{info_span, Span};

/// Span covering one drive loop from first step to terminal status.
pub fn verification_span(id: &VerificationId) -> Span {
    info_span!("verification", id = %id)
}

/// Span covering one step, retries included.
pub fn step_span(step: StepName) -> Span {
    info_span!("step", step = %step)
}

/// Span covering the startup reconciliation sweep.
pub fn reconcile_span() -> Span {
    info_span!("reconcile")
}
