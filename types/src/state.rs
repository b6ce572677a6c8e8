//! Lifecycle status enums for documents, verification records and steps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle status of an issued document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Issued, not yet successfully verified.
    #[default]
    Pending,
    /// A verification completed with every check passing.
    Verified,
    /// A verification failed and the deployment rejects documents on failure.
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

/// Overall status of one verification attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationStatus {
    /// The drive loop is (or should be) running.
    #[default]
    InProgress,
    /// Every step passed.
    Completed,
    /// A step failed, or the pipeline could not be evaluated.
    Failed,
    /// Cancelled on request before reaching another terminal status.
    Cancelled,
}

impl VerificationStatus {
    /// Terminal records are never mutated again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single step inside a verification record.
///
/// `Completed` means "execution finished" and says nothing about pass/fail;
/// the step's `result` carries the outcome. `Failed` is reserved for steps
/// that could not be evaluated at all (infrastructure fault, cancellation,
/// interrupted by restart).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}
