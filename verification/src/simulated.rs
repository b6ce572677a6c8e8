//! Reference executor that simulates slow external checks.

use std::time::Duration;

use async_trait::async_trait;
use docverify_types::StepName;
use rand::Rng;

use crate::{ExecutorError, StepContext, StepExecutor, StepOutcome};

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Independent chance that any one step passes.
    pub pass_probability: f64,
    pub min_latency: Duration,
    pub max_latency: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            pass_probability: 0.8,
            min_latency: Duration::from_millis(2_000),
            max_latency: Duration::from_millis(4_000),
        }
    }
}

/// Passes each step with a fixed probability after a random delay.
pub struct SimulatedStepExecutor {
    config: SimulationConfig,
}

impl SimulatedStepExecutor {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    fn draw(&self) -> (Duration, bool) {
        let mut rng = rand::thread_rng();
        let min = self.config.min_latency.as_millis() as u64;
        let max = (self.config.max_latency.as_millis() as u64).max(min);
        let latency = Duration::from_millis(rng.gen_range(min..=max));
        let p = self.config.pass_probability.clamp(0.0, 1.0);
        (latency, rng.gen_bool(p))
    }
}

impl Default for SimulatedStepExecutor {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

#[async_trait]
impl StepExecutor for SimulatedStepExecutor {
    async fn execute(
        &self,
        step: StepName,
        ctx: &StepContext,
    ) -> Result<StepOutcome, ExecutorError> {
        // ThreadRng is not Send; draw before the await point.
        let (latency, passed) = self.draw();
        tracing::debug!(
            %step,
            document = %ctx.document.id,
            latency_ms = latency.as_millis() as u64,
            "simulating step"
        );
        tokio::time::sleep(latency).await;
        Ok(if passed {
            StepOutcome::pass(step)
        } else {
            StepOutcome::fail(step)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docverify_nullables::sample_document;
    use docverify_types::VerificationId;

    fn ctx() -> StepContext {
        StepContext {
            verification_id: VerificationId::generate(),
            document: sample_document("uni-1"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_pass_waits_within_bounds() {
        let exec = SimulatedStepExecutor::new(SimulationConfig {
            pass_probability: 1.0,
            min_latency: Duration::from_millis(2_000),
            max_latency: Duration::from_millis(4_000),
        });
        let start = tokio::time::Instant::now();
        let out = exec.execute(StepName::OcrVerification, &ctx()).await.unwrap();
        let waited = start.elapsed();
        assert_eq!(out, StepOutcome::pass(StepName::OcrVerification));
        assert!(waited >= Duration::from_millis(2_000));
        assert!(waited <= Duration::from_millis(4_001));
    }

    #[tokio::test(start_paused = true)]
    async fn never_pass_reports_business_failure() {
        let exec = SimulatedStepExecutor::new(SimulationConfig {
            pass_probability: 0.0,
            min_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
        });
        let out = exec
            .execute(StepName::WatermarkFontCheck, &ctx())
            .await
            .unwrap();
        assert_eq!(out, StepOutcome::fail(StepName::WatermarkFontCheck));
    }

    #[test]
    fn inverted_latency_bounds_do_not_panic() {
        let exec = SimulatedStepExecutor::new(SimulationConfig {
            pass_probability: 0.5,
            min_latency: Duration::from_millis(10),
            max_latency: Duration::from_millis(5),
        });
        let (latency, _) = exec.draw();
        assert_eq!(latency, Duration::from_millis(10));
    }
}
