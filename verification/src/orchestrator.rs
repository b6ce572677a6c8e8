//! Verification orchestrator: owns each verification record from creation to
//! a terminal status.
//!
//! One drive loop per record walks the steps in declared order. Every step
//! transition is persisted before the next one begins, so the stored record
//! is always a faithful picture of how far the run got:
//!
//! ```text
//! pending ──> in-progress ──> completed(result)
//!                        └──> failed (executor fault / cancelled / store fault)
//! ```
//!
//! The first `false` result fails the whole record and leaves the remaining
//! steps `pending`. When every step passes, the owning document becomes
//! `verified` first, then the last step and the `completed` status land in a
//! single write. Cancellation only interrupts step execution; once the run
//! has a verdict it is finalized.

use std::sync::Arc;

use docverify_store::{
    Document, DocumentPatch, DocumentStore, StepState, StoreError, VerificationPatch,
    VerificationRecord, VerificationResults, VerificationStore,
};
use docverify_types::{
    DocumentId, DocumentStatus, StepName, StepStatus, Timestamp, UserId, VerificationId,
    VerificationStatus,
};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::Instrument;

use crate::spans::{step_span, verification_span};
use crate::{
    DocumentFailurePolicy, ExecutorError, OrchestratorConfig, StepContext, StepExecutor,
    StepOutcome, TaskRegistry, VerificationError, VerificationEvent,
};

/// Detail recorded on the in-flight step of a cancelled verification.
pub const CANCELLED_DETAIL: &str = "cancelled";

/// How a drive loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DriveOutcome {
    Completed,
    Failed,
    Cancelled,
    /// The loop stopped without finalizing the record itself.
    Abandoned,
}

/// Why a drive loop stopped before reaching a terminal status on its own.
#[derive(Debug)]
pub(crate) enum Halt {
    /// The record disappeared from the store.
    Vanished,
    /// The record was finalized by someone else.
    AlreadyTerminal,
    /// A store operation kept failing after retries.
    Store {
        step: Option<StepName>,
        error: StoreError,
    },
}

/// How the steps of a run came out, before the record is finalized.
enum Verdict {
    /// Every step passed. `last` is the final step's completed state and
    /// latency, not yet persisted; `None` when a resumed record had nothing
    /// left to run.
    Passed {
        document: Document,
        last: Option<(StepState, u64)>,
        floor: Timestamp,
    },
    /// A step came back `false` or could not be evaluated.
    Rejected(Rejection),
}

struct Rejection {
    step: StepName,
    state: StepState,
    reason: String,
    latency_ms: u64,
    result: Option<bool>,
}

pub struct VerificationOrchestrator {
    pub(crate) documents: Arc<dyn DocumentStore + Send + Sync>,
    pub(crate) verifications: Arc<dyn VerificationStore + Send + Sync>,
    executor: Arc<dyn StepExecutor>,
    pub(crate) config: OrchestratorConfig,
    pub(crate) registry: TaskRegistry,
    events: broadcast::Sender<VerificationEvent>,
}

impl VerificationOrchestrator {
    pub fn new(
        documents: Arc<dyn DocumentStore + Send + Sync>,
        verifications: Arc<dyn VerificationStore + Send + Sync>,
        executor: Arc<dyn StepExecutor>,
        config: OrchestratorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            documents,
            verifications,
            executor,
            config,
            registry: TaskRegistry::new(),
            events,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore + Send + Sync> {
        &self.documents
    }

    pub fn verifications(&self) -> &Arc<dyn VerificationStore + Send + Sync> {
        &self.verifications
    }

    /// Receive progress events for every verification.
    pub fn subscribe(&self) -> broadcast::Receiver<VerificationEvent> {
        self.events.subscribe()
    }

    /// Number of live drive loops.
    pub async fn active_count(&self) -> usize {
        self.registry.active_count().await
    }

    /// Create a verification record for `document_id` and start driving it.
    ///
    /// Returns as soon as the record is stored; the steps run in a background
    /// task. Must be called from within a Tokio runtime.
    pub async fn start_verification(
        self: &Arc<Self>,
        document_id: DocumentId,
        requester: &UserId,
    ) -> Result<VerificationId, VerificationError> {
        match self.documents.get_by_id(&document_id) {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => {
                return Err(VerificationError::DocumentNotFound(document_id))
            }
            Err(e) => return Err(e.into()),
        }

        self.registry.ensure_open().await?;

        let record = VerificationRecord::new(document_id, requester.clone(), Timestamp::now());
        self.verifications.create(&record)?;
        tracing::info!(
            verification = %record.id,
            document = %document_id,
            requester = %requester,
            "verification requested"
        );

        // The record exists from here on; problems surface through its status.
        if let Err(e) = self.launch(record.id).await {
            self.fail_unlaunched(record.id, e).await;
        }
        Ok(record.id)
    }

    pub fn get_verification(
        &self,
        id: &VerificationId,
    ) -> Result<VerificationRecord, VerificationError> {
        match self.verifications.get_by_id(id) {
            Ok(record) => Ok(record),
            Err(StoreError::NotFound(_)) => Err(VerificationError::VerificationNotFound(*id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Ask the drive loop of `id` to stop.
    ///
    /// `Ok(false)` means the record exists but has no live drive loop that
    /// can still be interrupted (it is already terminal, being finalized, or
    /// awaiting reconciliation). The record turns `cancelled` asynchronously.
    pub async fn cancel_verification(
        &self,
        id: &VerificationId,
    ) -> Result<bool, VerificationError> {
        if self.registry.cancel(id).await {
            tracing::info!(verification = %id, "cancellation requested");
            return Ok(true);
        }
        self.get_verification(id)?;
        Ok(false)
    }

    /// Abort every drive loop and wait for them to stop.
    ///
    /// Interrupted records stay `in-progress` until the next reconciliation.
    pub async fn shutdown(&self) {
        let aborted = self.registry.shutdown().await;
        tracing::info!(aborted, "verification orchestrator stopped");
    }

    /// Register and spawn the drive loop for an existing record.
    pub(crate) async fn launch(self: &Arc<Self>, id: VerificationId) -> Result<(), VerificationError> {
        let this = Arc::clone(self);
        self.registry
            .spawn(id, move |cancel| {
                async move {
                    let outcome = this.drive(id, cancel).await;
                    tracing::debug!(?outcome, "drive loop finished");
                }
                .instrument(verification_span(&id))
            })
            .await
    }

    pub(crate) fn emit(&self, event: VerificationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn drive(&self, id: VerificationId, mut cancel: broadcast::Receiver<()>) -> DriveOutcome {
        let verdict = tokio::select! {
            biased;
            Ok(()) = cancel.recv() => return self.finish_cancelled(id).await,
            verdict = self.run_steps(id) => verdict,
        };
        drop(cancel);

        let finished = match verdict {
            Ok(Verdict::Passed {
                document,
                last,
                floor,
            }) => self.finish_completed(id, document, last, floor).await,
            Ok(Verdict::Rejected(rejection)) => self.fail_at_step(id, rejection).await,
            Err(halt) => Err(halt),
        };
        match finished {
            Ok(outcome) => outcome,
            Err(halt) => self.handle_halt(id, halt).await,
        }
    }

    async fn run_steps(&self, id: VerificationId) -> Result<Verdict, Halt> {
        let record = match self.verifications.get_by_id(&id) {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => return Err(Halt::Vanished),
            Err(error) => return Err(Halt::Store { step: None, error }),
        };
        if record.is_terminal() {
            return Err(Halt::AlreadyTerminal);
        }
        let document = self
            .with_store_retry("read document", || self.documents.get_by_id(&record.document))
            .await
            .map_err(|error| Halt::Store { step: None, error })?;

        self.emit(VerificationEvent::Started {
            verification_id: id,
            document_id: record.document,
        });

        let ctx = StepContext {
            verification_id: id,
            document,
        };
        let first = record
            .next_step()
            .map_or(StepName::COUNT, |step| step.index());
        let last_step = StepName::ALL[StepName::COUNT - 1];
        let mut floor = record.last_transition();

        for name in StepName::ALL.into_iter().skip(first) {
            let mut state = record.step(name).cloned().ok_or_else(|| Halt::Store {
                step: Some(name),
                error: StoreError::Corruption(format!("verification {id} has no {name} step")),
            })?;

            let now = Timestamp::now_at_least(floor);
            floor = now;
            state.mark_in_progress(now);
            self.persist(id, Some(name), &VerificationPatch::step(state.clone()))
                .await?;
            self.emit(VerificationEvent::StepStarted {
                verification_id: id,
                step: name,
            });
            tracing::debug!(step = %name, "step started");

            let started = Instant::now();
            let result = self
                .execute_step(id, name, &ctx)
                .instrument(step_span(name))
                .await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let now = Timestamp::now_at_least(floor);
            floor = now;
            match result {
                Ok(StepOutcome { result: true, details }) => {
                    state.mark_completed(true, details, now);
                    tracing::debug!(step = %name, latency_ms, "step passed");
                    if name == last_step {
                        return Ok(Verdict::Passed {
                            document: ctx.document,
                            last: Some((state, latency_ms)),
                            floor,
                        });
                    }
                    self.persist(id, Some(name), &VerificationPatch::step(state))
                        .await?;
                    self.emit(VerificationEvent::StepFinished {
                        verification_id: id,
                        step: name,
                        result: Some(true),
                        latency_ms,
                    });
                }
                Ok(StepOutcome {
                    result: false,
                    details,
                }) => {
                    state.mark_completed(false, details.clone(), now);
                    return Ok(Verdict::Rejected(Rejection {
                        step: name,
                        state,
                        reason: details,
                        latency_ms,
                        result: Some(false),
                    }));
                }
                Err(e) => {
                    let detail = format!("{name} could not be evaluated: {e}");
                    tracing::warn!(step = %name, error = %e, "step retries exhausted");
                    state.mark_failed(detail.clone(), now);
                    return Ok(Verdict::Rejected(Rejection {
                        step: name,
                        state,
                        reason: detail,
                        latency_ms,
                        result: None,
                    }));
                }
            }
        }

        Ok(Verdict::Passed {
            document: ctx.document,
            last: None,
            floor,
        })
    }

    /// Mark the document `verified`, then store the final step together with
    /// the `completed` status.
    ///
    /// If the document cannot be updated, the final step is still
    /// `in-progress` in the store and the record fails on it.
    async fn finish_completed(
        &self,
        id: VerificationId,
        before: Document,
        last: Option<(StepState, u64)>,
        floor: Timestamp,
    ) -> Result<DriveOutcome, Halt> {
        let step = last.as_ref().map(|(state, _)| state.step);

        let mut results = VerificationResults::default();
        for name in StepName::ALL {
            results.set(name, Some(true));
        }
        let patch = DocumentPatch {
            status: Some(DocumentStatus::Verified),
            verification_results: Some(results),
        };
        self.with_store_retry("update document", || {
            self.documents.update(&before.id, &patch)
        })
        .await
        .map_err(|error| Halt::Store { step, error })?;

        let now = Timestamp::now_at_least(floor);
        let mut completion =
            VerificationPatch::status(VerificationStatus::Completed).with_completed_at(now);
        if let Some((state, _)) = &last {
            completion = completion.with_step(state.clone());
        }
        if let Err(halt) = self.persist(id, step, &completion).await {
            self.restore_document(&before).await;
            return Err(halt);
        }

        if let Some((state, latency_ms)) = last {
            self.emit(VerificationEvent::StepFinished {
                verification_id: id,
                step: state.step,
                result: Some(true),
                latency_ms,
            });
        }
        tracing::info!(document = %before.id, "verification completed");
        self.emit(VerificationEvent::Completed {
            verification_id: id,
            document_id: before.id,
        });
        Ok(DriveOutcome::Completed)
    }

    /// Put a document back the way it was before a completion that did not
    /// stick.
    async fn restore_document(&self, before: &Document) {
        let patch = DocumentPatch {
            status: Some(before.status),
            verification_results: Some(before.verification_results),
        };
        if let Err(e) = self
            .with_store_retry("restore document", || {
                self.documents.update(&before.id, &patch)
            })
            .await
        {
            tracing::error!(document = %before.id, error = %e, "could not restore document");
        }
    }

    /// Persist the final state of the rejected step together with a `failed`
    /// record status.
    async fn fail_at_step(
        &self,
        id: VerificationId,
        rejection: Rejection,
    ) -> Result<DriveOutcome, Halt> {
        let Rejection {
            step,
            state,
            reason,
            latency_ms,
            result,
        } = rejection;
        let at = state.timestamp;
        let patch = VerificationPatch::step(state)
            .with_status(VerificationStatus::Failed)
            .with_completed_at(at);
        let record = self.persist(id, Some(step), &patch).await?;
        self.emit(VerificationEvent::StepFinished {
            verification_id: id,
            step,
            result,
            latency_ms,
        });
        tracing::info!(%step, %reason, "verification failed");
        self.apply_failure_policy(&record).await;
        self.emit(VerificationEvent::Failed {
            verification_id: id,
            step: Some(step),
            reason,
        });
        Ok(DriveOutcome::Failed)
    }

    /// Fail a freshly created record whose drive loop could not be spawned.
    async fn fail_unlaunched(&self, id: VerificationId, error: VerificationError) {
        tracing::error!(verification = %id, error = %error, "drive loop could not be started");
        let step = StepName::ALL[0];
        let detail = format!("verification could not be started: {error}");
        match self
            .close_record(id, VerificationStatus::Failed, &detail, Some(step))
            .await
        {
            Ok(_) => self.emit(VerificationEvent::Failed {
                verification_id: id,
                step: Some(step),
                reason: detail,
            }),
            Err(halt) => {
                tracing::error!(verification = %id, ?halt, "could not mark verification failed")
            }
        }
    }

    async fn execute_step(
        &self,
        id: VerificationId,
        step: StepName,
        ctx: &StepContext,
    ) -> Result<StepOutcome, ExecutorError> {
        let policy = self.config.step_retry;
        let mut tries = 0;
        loop {
            tries += 1;
            match self.executor.execute(step, ctx).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if policy.should_retry(tries) => {
                    let delay = policy.backoff(tries - 1);
                    tracing::warn!(
                        error = %e,
                        attempt = tries,
                        delay_ms = delay.as_millis() as u64,
                        "step executor fault, retrying"
                    );
                    self.emit(VerificationEvent::StepRetrying {
                        verification_id: id,
                        step,
                        attempt: tries,
                        error: e.to_string(),
                    });
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn finish_cancelled(&self, id: VerificationId) -> DriveOutcome {
        match self
            .close_record(id, VerificationStatus::Cancelled, CANCELLED_DETAIL, None)
            .await
        {
            Ok(_) => {
                tracing::info!("verification cancelled");
                self.emit(VerificationEvent::Cancelled {
                    verification_id: id,
                });
                DriveOutcome::Cancelled
            }
            Err(halt) => {
                tracing::debug!(?halt, "cancellation arrived after the record was finalized");
                DriveOutcome::Abandoned
            }
        }
    }

    async fn handle_halt(&self, id: VerificationId, halt: Halt) -> DriveOutcome {
        match halt {
            Halt::Vanished => {
                tracing::debug!("verification record vanished, abandoning");
                DriveOutcome::Abandoned
            }
            Halt::AlreadyTerminal => {
                tracing::debug!("verification already terminal, abandoning");
                DriveOutcome::Abandoned
            }
            Halt::Store { step, error } => {
                tracing::error!(error = %error, "store unavailable, failing verification");
                let detail = format!("verification state could not be stored: {error}");
                match self
                    .close_record(id, VerificationStatus::Failed, &detail, step)
                    .await
                {
                    Ok(record) => {
                        self.apply_failure_policy(&record).await;
                        self.emit(VerificationEvent::Failed {
                            verification_id: id,
                            step,
                            reason: detail,
                        });
                        DriveOutcome::Failed
                    }
                    Err(halt) => {
                        tracing::error!(?halt, "could not mark verification failed");
                        DriveOutcome::Abandoned
                    }
                }
            }
        }
    }

    /// Move a live record to a terminal `status`.
    ///
    /// Every step still `in-progress`, plus `step` if it is still `pending`,
    /// is marked `failed` with `detail`. Later steps stay `pending`.
    pub(crate) async fn close_record(
        &self,
        id: VerificationId,
        status: VerificationStatus,
        detail: &str,
        step: Option<StepName>,
    ) -> Result<VerificationRecord, Halt> {
        let record = match self.verifications.get_by_id(&id) {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => return Err(Halt::Vanished),
            Err(error) => return Err(Halt::Store { step, error }),
        };
        if record.is_terminal() {
            return Err(Halt::AlreadyTerminal);
        }

        let now = Timestamp::now_at_least(record.last_transition());
        let mut patch = VerificationPatch::status(status).with_completed_at(now);
        for state in &record.steps {
            let interrupted = state.status == StepStatus::InProgress
                || (Some(state.step) == step && state.status == StepStatus::Pending);
            if interrupted {
                let mut failed = state.clone();
                failed.mark_failed(detail, now);
                patch = patch.with_step(failed);
            }
        }
        self.persist(id, step, &patch).await
    }

    /// Apply `patch`, retrying transient store faults.
    pub(crate) async fn persist(
        &self,
        id: VerificationId,
        step: Option<StepName>,
        patch: &VerificationPatch,
    ) -> Result<VerificationRecord, Halt> {
        match self
            .with_store_retry("update verification", || {
                self.verifications.update(&id, patch)
            })
            .await
        {
            Ok(record) => Ok(record),
            Err(StoreError::NotFound(_)) => Err(Halt::Vanished),
            Err(StoreError::Immutable(_)) => Err(Halt::AlreadyTerminal),
            Err(error) => Err(Halt::Store { step, error }),
        }
    }

    async fn with_store_retry<T>(
        &self,
        what: &'static str,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let policy = self.config.persist_retry;
        let mut tries = 0;
        loop {
            tries += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && policy.should_retry(tries) => {
                    let delay = policy.backoff(tries - 1);
                    tracing::warn!(
                        error = %e,
                        attempt = tries,
                        delay_ms = delay.as_millis() as u64,
                        "{what} failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub(crate) async fn apply_failure_policy(&self, record: &VerificationRecord) {
        if self.config.document_failure_policy != DocumentFailurePolicy::Reject {
            return;
        }
        let patch = DocumentPatch {
            status: Some(DocumentStatus::Rejected),
            verification_results: Some(VerificationResults::from_steps(&record.steps)),
        };
        if let Err(e) = self
            .with_store_retry("reject document", || {
                self.documents.update(&record.document, &patch)
            })
            .await
        {
            tracing::error!(document = %record.document, error = %e, "could not reject document");
        }
    }
}
