//! Verification records, step state, and the verification storage trait.

use docverify_types::{
    DocumentId, StepName, StepStatus, Timestamp, UserId, VerificationId, VerificationStatus,
};
use serde::{Deserialize, Serialize};

use crate::query::{Pagination, SortOrder, Sortable};
use crate::StoreError;

/// State of one step inside a verification record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepState {
    pub step: StepName,
    pub status: StepStatus,
    pub result: Option<bool>,
    pub details: Option<String>,
    /// Time of the last transition.
    pub timestamp: Timestamp,
}

impl StepState {
    pub fn pending(step: StepName, now: Timestamp) -> Self {
        Self {
            step,
            status: StepStatus::Pending,
            result: None,
            details: None,
            timestamp: now,
        }
    }

    pub fn mark_in_progress(&mut self, now: Timestamp) {
        self.status = StepStatus::InProgress;
        self.timestamp = now;
    }

    /// Execution finished. `result` carries pass/fail.
    pub fn mark_completed(&mut self, result: bool, details: impl Into<String>, now: Timestamp) {
        self.status = StepStatus::Completed;
        self.result = Some(result);
        self.details = Some(details.into());
        self.timestamp = now;
    }

    /// The step could not be evaluated. No result is recorded.
    pub fn mark_failed(&mut self, details: impl Into<String>, now: Timestamp) {
        self.status = StepStatus::Failed;
        self.result = None;
        self.details = Some(details.into());
        self.timestamp = now;
    }

    pub fn reset_pending(&mut self, now: Timestamp) {
        self.status = StepStatus::Pending;
        self.result = None;
        self.details = None;
        self.timestamp = now;
    }

    /// Completed with a passing result.
    pub fn passed(&self) -> bool {
        self.status == StepStatus::Completed && self.result == Some(true)
    }
}

/// One verification attempt of one document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    pub id: VerificationId,
    pub document: DocumentId,
    pub requested_by: UserId,
    pub status: VerificationStatus,
    /// Always one entry per [`StepName::ALL`], in that order.
    pub steps: Vec<StepState>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl VerificationRecord {
    /// A new `in-progress` record with every step `pending`.
    pub fn new(document: DocumentId, requested_by: UserId, now: Timestamp) -> Self {
        Self {
            id: VerificationId::generate(),
            document,
            requested_by,
            status: VerificationStatus::InProgress,
            steps: StepName::ALL
                .iter()
                .map(|&step| StepState::pending(step, now))
                .collect(),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn step(&self, name: StepName) -> Option<&StepState> {
        self.steps.iter().find(|s| s.step == name)
    }

    pub fn step_mut(&mut self, name: StepName) -> Option<&mut StepState> {
        self.steps.iter_mut().find(|s| s.step == name)
    }

    /// Steps currently marked in-progress (at most one in a healthy record).
    pub fn in_progress_steps(&self) -> impl Iterator<Item = &StepState> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::InProgress)
    }

    /// Latest step transition time, used as a floor for the next transition.
    pub fn last_transition(&self) -> Timestamp {
        self.steps
            .iter()
            .map(|s| s.timestamp)
            .max()
            .unwrap_or(self.created_at)
    }

    /// First step that has not completed with a passing result.
    pub fn next_step(&self) -> Option<StepName> {
        StepName::ALL
            .into_iter()
            .find(|&name| !self.step(name).is_some_and(|s| s.passed()))
    }
}

impl Sortable for VerificationRecord {
    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn sort_key(&self) -> [u8; 16] {
        *self.id.as_bytes()
    }
}

/// A partial update to a verification record.
///
/// Step entries replace the record's state for the same step name. Applying
/// any patch to a terminal record fails with [`StoreError::Immutable`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationPatch {
    pub status: Option<VerificationStatus>,
    pub steps: Vec<StepState>,
    pub completed_at: Option<Timestamp>,
}

impl VerificationPatch {
    pub fn step(state: StepState) -> Self {
        Self {
            steps: vec![state],
            ..Default::default()
        }
    }

    pub fn status(status: VerificationStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_step(mut self, state: StepState) -> Self {
        self.steps.push(state);
        self
    }

    pub fn with_status(mut self, status: VerificationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_completed_at(mut self, at: Timestamp) -> Self {
        self.completed_at = Some(at);
        self
    }

    /// Apply the patch in place and bump `updated_at`.
    pub fn apply(&self, record: &mut VerificationRecord, now: Timestamp) -> Result<(), StoreError> {
        if record.is_terminal() {
            return Err(StoreError::Immutable(record.id.to_string()));
        }
        let id = record.id;
        for state in &self.steps {
            let slot = record.step_mut(state.step).ok_or_else(|| {
                StoreError::Corruption(format!("verification {id} has no {} step", state.step))
            })?;
            *slot = state.clone();
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(at) = self.completed_at {
            record.completed_at = Some(at);
        }
        record.updated_at = now.max(record.updated_at);
        Ok(())
    }
}

/// Filter for [`VerificationStore::find`] / [`VerificationStore::count`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationFilter {
    pub requested_by: Option<UserId>,
    pub document: Option<DocumentId>,
    pub status: Option<VerificationStatus>,
}

impl VerificationFilter {
    pub fn requested_by(user: UserId) -> Self {
        Self {
            requested_by: Some(user),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: VerificationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, record: &VerificationRecord) -> bool {
        self.requested_by
            .as_ref()
            .map_or(true, |u| &record.requested_by == u)
            && self.document.map_or(true, |d| record.document == d)
            && self.status.map_or(true, |s| record.status == s)
    }
}

/// Trait for verification record storage operations.
pub trait VerificationStore {
    /// Persist a new record. Fails with `Duplicate` if the id is taken.
    fn create(&self, record: &VerificationRecord) -> Result<(), StoreError>;

    /// Fetch a record. Fails with `NotFound` if absent.
    fn get_by_id(&self, id: &VerificationId) -> Result<VerificationRecord, StoreError>;

    /// Read-modify-write a single record and return the updated record.
    ///
    /// Fails with `NotFound` if the record vanished and with `Immutable` if it
    /// is already terminal.
    fn update(
        &self,
        id: &VerificationId,
        patch: &VerificationPatch,
    ) -> Result<VerificationRecord, StoreError>;

    /// Matching records, ordered and paged.
    fn find(
        &self,
        filter: &VerificationFilter,
        pagination: Pagination,
        sort: SortOrder,
    ) -> Result<Vec<VerificationRecord>, StoreError>;

    /// Number of matching records.
    fn count(&self, filter: &VerificationFilter) -> Result<u64, StoreError>;
}
