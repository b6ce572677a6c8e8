//! Notifications emitted by the orchestrator as drive loops progress.

use docverify_types::{DocumentId, StepName, VerificationId};
use serde::Serialize;

/// Progress events, fanned out over a `tokio::sync::broadcast` channel.
///
/// Receivers that fall behind lose the oldest events; the stores remain the
/// source of truth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum VerificationEvent {
    /// A drive loop started (or resumed after a restart).
    Started {
        verification_id: VerificationId,
        document_id: DocumentId,
    },
    StepStarted {
        verification_id: VerificationId,
        step: StepName,
    },
    /// The executor reported an infrastructure fault and the step will be retried.
    StepRetrying {
        verification_id: VerificationId,
        step: StepName,
        attempt: u32,
        error: String,
    },
    /// A step left `in-progress`. `result` is unset if the step could not be evaluated.
    StepFinished {
        verification_id: VerificationId,
        step: StepName,
        result: Option<bool>,
        latency_ms: u64,
    },
    Completed {
        verification_id: VerificationId,
        document_id: DocumentId,
    },
    Failed {
        verification_id: VerificationId,
        step: Option<StepName>,
        reason: String,
    },
    Cancelled {
        verification_id: VerificationId,
    },
}

impl VerificationEvent {
    pub fn verification_id(&self) -> VerificationId {
        match self {
            Self::Started {
                verification_id, ..
            }
            | Self::StepStarted {
                verification_id, ..
            }
            | Self::StepRetrying {
                verification_id, ..
            }
            | Self::StepFinished {
                verification_id, ..
            }
            | Self::Completed {
                verification_id, ..
            }
            | Self::Failed {
                verification_id, ..
            }
            | Self::Cancelled { verification_id } => *verification_id,
        }
    }

    /// Whether this event ends a drive loop.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}
