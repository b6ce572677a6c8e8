//! DocVerify node: wires every subsystem into one running process.
//!
//! The node:
//! - Opens the LMDB environment and migrates its schema
//! - Builds the verification orchestrator over the LMDB stores
//! - Reconciles verifications interrupted by a previous shutdown or crash
//! - Serves the HTTP API and the WebSocket event feed
//! - Exposes Prometheus metrics fed from orchestrator events

pub mod config;
pub mod error;
pub mod event_relay;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;

pub use config::{NodeConfig, VerificationConfig};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::DocVerifyNode;
pub use shutdown::{ShutdownController, ShutdownSignal};
