//! Document verification workflow engine.
//!
//! A verification drives one document through a fixed, ordered sequence of
//! checks ([`StepName::ALL`](docverify_types::StepName::ALL)). Each check is
//! delegated to a pluggable [`StepExecutor`]; the [`VerificationOrchestrator`]
//! persists every step transition, stops at the first failing check, and
//! finalizes the owning document when the run completes.
//!
//! Drive loops are long-running tokio tasks supervised by a [`TaskRegistry`],
//! so they can be cancelled individually and torn down at shutdown. Records
//! left `in-progress` by a crash are picked up again by
//! [`VerificationOrchestrator::reconcile`].

pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod orchestrator;
pub mod reconcile;
pub mod registry;
pub mod retry;
pub mod simulated;
pub mod spans;

pub use config::{DocumentFailurePolicy, OrchestratorConfig};
pub use error::{ExecutorError, VerificationError};
pub use event::VerificationEvent;
pub use executor::{StepContext, StepExecutor, StepOutcome};
pub use orchestrator::VerificationOrchestrator;
pub use reconcile::{ReconcilePolicy, ReconcileReport};
pub use registry::TaskRegistry;
pub use retry::RetryPolicy;
pub use simulated::{SimulatedStepExecutor, SimulationConfig};
