//! Prometheus metrics for the DocVerify node.
//!
//! The [`NodeMetrics`] struct owns a dedicated [`Registry`] that the RPC
//! `/metrics` endpoint encodes into the Prometheus text exposition format.
//! Values are fed from the orchestrator's event stream.

use docverify_verification::VerificationEvent;
use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, HistogramOpts, IntCounter, IntGauge, Opts,
    Registry,
};

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Drive loops started (including loops resumed by reconciliation).
    pub verifications_started: IntCounter,
    pub verifications_completed: IntCounter,
    pub verifications_failed: IntCounter,
    pub verifications_cancelled: IntCounter,
    /// Steps that produced a result or were given up on.
    pub steps_executed: IntCounter,
    /// Step executions retried after an infrastructure fault.
    pub step_retries: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Current number of live drive loops.
    pub active_verifications: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall-clock time of a single step, in milliseconds.
    pub step_latency_ms: Histogram,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Counters
        let verifications_started = register_int_counter_with_registry!(
            Opts::new(
                "docverify_verifications_started_total",
                "Verification drive loops started"
            ),
            registry
        )?;

        let verifications_completed = register_int_counter_with_registry!(
            Opts::new(
                "docverify_verifications_completed_total",
                "Verifications that passed every step"
            ),
            registry
        )?;

        let verifications_failed = register_int_counter_with_registry!(
            Opts::new(
                "docverify_verifications_failed_total",
                "Verifications that ended failed"
            ),
            registry
        )?;

        let verifications_cancelled = register_int_counter_with_registry!(
            Opts::new(
                "docverify_verifications_cancelled_total",
                "Verifications cancelled on request"
            ),
            registry
        )?;

        let steps_executed = register_int_counter_with_registry!(
            Opts::new("docverify_steps_executed_total", "Verification steps finished"),
            registry
        )?;

        let step_retries = register_int_counter_with_registry!(
            Opts::new(
                "docverify_step_retries_total",
                "Step executions retried after an infrastructure fault"
            ),
            registry
        )?;

        // Gauges
        let active_verifications = register_int_gauge_with_registry!(
            Opts::new(
                "docverify_active_verifications",
                "Current number of live verification drive loops"
            ),
            registry
        )?;

        // Histograms – exponential buckets covering 1 ms → ~16 s.
        let step_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "docverify_step_latency_ms",
                "Verification step latency in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            verifications_started,
            verifications_completed,
            verifications_failed,
            verifications_cancelled,
            steps_executed,
            step_retries,
            active_verifications,
            step_latency_ms,
        })
    }

    /// Update counters and histograms for one orchestrator event.
    pub fn observe(&self, event: &VerificationEvent) {
        match event {
            VerificationEvent::Started { .. } => self.verifications_started.inc(),
            VerificationEvent::StepStarted { .. } => {}
            VerificationEvent::StepRetrying { .. } => self.step_retries.inc(),
            VerificationEvent::StepFinished { latency_ms, .. } => {
                self.steps_executed.inc();
                self.step_latency_ms.observe(*latency_ms as f64);
            }
            VerificationEvent::Completed { .. } => self.verifications_completed.inc(),
            VerificationEvent::Failed { .. } => self.verifications_failed.inc(),
            VerificationEvent::Cancelled { .. } => self.verifications_cancelled.inc(),
        }
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        use prometheus::{Encoder, TextEncoder};

        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
