//! Startup sweep over verifications a previous process left `in-progress`.

use std::sync::Arc;

use docverify_store::{Pagination, SortOrder, VerificationFilter, VerificationPatch};
use docverify_types::{StepStatus, Timestamp, VerificationStatus};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::orchestrator::Halt;
use crate::spans::reconcile_span;
use crate::{VerificationError, VerificationEvent, VerificationOrchestrator};

/// Detail recorded on the interrupted step when reconciliation fails a record.
pub const INTERRUPTED_DETAIL: &str = "interrupted by restart";

/// What to do with records found `in-progress` at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcilePolicy {
    /// Reset the interrupted step and continue from the first step that has
    /// not passed.
    #[default]
    Resume,
    /// Mark the record `failed`.
    Fail,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub resumed: usize,
    pub failed: usize,
    /// Already driven by a live loop, or finalized while the sweep ran.
    pub skipped: usize,
}

impl VerificationOrchestrator {
    /// Resume or fail every `in-progress` record without a live drive loop.
    pub async fn reconcile(
        self: &Arc<Self>,
        policy: ReconcilePolicy,
    ) -> Result<ReconcileReport, VerificationError> {
        self.reconcile_inner(policy)
            .instrument(reconcile_span())
            .await
    }

    async fn reconcile_inner(
        self: &Arc<Self>,
        policy: ReconcilePolicy,
    ) -> Result<ReconcileReport, VerificationError> {
        let orphans = self.verifications.find(
            &VerificationFilter::default().with_status(VerificationStatus::InProgress),
            Pagination::ALL,
            SortOrder::OldestFirst,
        )?;

        let mut report = ReconcileReport {
            scanned: orphans.len(),
            ..Default::default()
        };

        for record in orphans {
            if self.registry.is_running(&record.id).await {
                report.skipped += 1;
                continue;
            }

            match policy {
                ReconcilePolicy::Resume => {
                    let now = Timestamp::now_at_least(record.last_transition());
                    let mut patch = VerificationPatch::default();
                    for state in record.in_progress_steps() {
                        let mut reset = state.clone();
                        reset.reset_pending(now);
                        patch = patch.with_step(reset);
                    }
                    if !patch.steps.is_empty() {
                        self.verifications.update(&record.id, &patch)?;
                    }
                    self.launch(record.id).await?;
                    tracing::info!(verification = %record.id, "resumed verification");
                    report.resumed += 1;
                }
                ReconcilePolicy::Fail => {
                    let interrupted = record
                        .steps
                        .iter()
                        .find(|s| s.status == StepStatus::InProgress)
                        .map(|s| s.step);
                    match self
                        .close_record(
                            record.id,
                            VerificationStatus::Failed,
                            INTERRUPTED_DETAIL,
                            None,
                        )
                        .await
                    {
                        Ok(closed) => {
                            self.apply_failure_policy(&closed).await;
                            self.emit(VerificationEvent::Failed {
                                verification_id: record.id,
                                step: interrupted,
                                reason: INTERRUPTED_DETAIL.to_string(),
                            });
                            tracing::info!(verification = %record.id, "failed interrupted verification");
                            report.failed += 1;
                        }
                        Err(Halt::Store { error, .. }) => return Err(error.into()),
                        Err(_) => report.skipped += 1,
                    }
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            resumed = report.resumed,
            failed = report.failed,
            skipped = report.skipped,
            "reconciliation finished"
        );
        Ok(report)
    }
}
