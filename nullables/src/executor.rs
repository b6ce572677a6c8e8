//! Nullable step executor with scripted outcomes instead of random ones.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use docverify_types::{StepName, VerificationId};
use docverify_verification::{ExecutorError, StepContext, StepExecutor, StepOutcome};

/// Scripted behaviour for one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptedStep {
    Pass,
    Fail,
    /// Report an infrastructure fault `n` times per verification, then pass.
    FaultThenPass(u32),
    /// Report an infrastructure fault on every call.
    Fault,
    /// Never return.
    Hang,
}

/// A deterministic step executor for testing.
///
/// Steps pass unless scripted otherwise. Every call is recorded.
pub struct NullStepExecutor {
    script: HashMap<StepName, ScriptedStep>,
    delay: Duration,
    faults_served: Mutex<HashMap<(VerificationId, StepName), u32>>,
    calls: Mutex<Vec<(VerificationId, StepName)>>,
}

impl NullStepExecutor {
    /// Every step passes immediately.
    pub fn new() -> Self {
        Self {
            script: HashMap::new(),
            delay: Duration::ZERO,
            faults_served: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every step passes except `step`, which fails.
    pub fn failing_at(step: StepName) -> Self {
        Self::new().with_step(step, ScriptedStep::Fail)
    }

    pub fn with_step(mut self, step: StepName, behaviour: ScriptedStep) -> Self {
        self.script.insert(step, behaviour);
        self
    }

    /// Simulated latency applied before every outcome.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every `(verification, step)` pair executed so far, in call order.
    pub fn calls(&self) -> Vec<(VerificationId, StepName)> {
        self.calls.lock().unwrap().clone()
    }

    /// Steps executed for one verification, in call order.
    pub fn steps_for(&self, id: &VerificationId) -> Vec<StepName> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(v, _)| v == id)
            .map(|(_, s)| *s)
            .collect()
    }
}

impl Default for NullStepExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StepExecutor for NullStepExecutor {
    async fn execute(
        &self,
        step: StepName,
        ctx: &StepContext,
    ) -> Result<StepOutcome, ExecutorError> {
        self.calls
            .lock()
            .unwrap()
            .push((ctx.verification_id, step));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.script.get(&step).copied().unwrap_or(ScriptedStep::Pass) {
            ScriptedStep::Pass => Ok(StepOutcome::pass(step)),
            ScriptedStep::Fail => Ok(StepOutcome::fail(step)),
            ScriptedStep::Fault => Err(ExecutorError::Unavailable(format!(
                "{step} backend unreachable"
            ))),
            ScriptedStep::FaultThenPass(n) => {
                let mut served = self.faults_served.lock().unwrap();
                let count = served.entry((ctx.verification_id, step)).or_insert(0);
                if *count < n {
                    *count += 1;
                    Err(ExecutorError::Unavailable(format!(
                        "{step} backend unreachable"
                    )))
                } else {
                    Ok(StepOutcome::pass(step))
                }
            }
            ScriptedStep::Hang => std::future::pending().await,
        }
    }
}
