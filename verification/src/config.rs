//! Orchestrator tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::RetryPolicy;

/// What happens to a document when one of its verifications fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentFailurePolicy {
    /// Leave the document untouched (still `pending`).
    #[default]
    LeavePending,
    /// Mark the document `rejected` and record the results observed so far.
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Retries for a step whose executor reports an infrastructure fault.
    pub step_retry: RetryPolicy,
    /// Retries for store writes that fail with a transient backend error.
    pub persist_retry: RetryPolicy,
    pub document_failure_policy: DocumentFailurePolicy,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            step_retry: RetryPolicy::new(3, Duration::from_millis(500)),
            persist_retry: RetryPolicy::new(5, Duration::from_millis(100)),
            document_failure_policy: DocumentFailurePolicy::default(),
            event_capacity: 1024,
        }
    }
}
