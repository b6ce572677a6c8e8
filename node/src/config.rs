//! Node configuration with TOML file support.

use std::path::{Path, PathBuf};
use std::time::Duration;

use docverify_verification::{
    DocumentFailurePolicy, OrchestratorConfig, ReconcilePolicy, RetryPolicy, SimulationConfig,
};
use serde::{Deserialize, Serialize};

use crate::{LogFormat, NodeError};

/// Configuration for a DocVerify node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub lmdb_map_size: usize,

    /// Whether to enable the RPC server.
    #[serde(default = "default_true")]
    pub enable_rpc: bool,

    /// RPC port (if enabled).
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Whether to enable the WebSocket server.
    #[serde(default)]
    pub enable_websocket: bool,

    /// WebSocket port (if enabled).
    #[serde(default = "default_ws_port")]
    pub websocket_port: u16,

    /// Whether to serve Prometheus metrics on the RPC `/metrics` route.
    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub verification: VerificationConfig,
}

/// The `[verification]` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Chance that a simulated step passes.
    #[serde(default = "default_pass_probability")]
    pub pass_probability: f64,

    #[serde(default = "default_min_latency_ms")]
    pub min_step_latency_ms: u64,

    #[serde(default = "default_max_latency_ms")]
    pub max_step_latency_ms: u64,

    /// Total tries for a step whose executor reports an infrastructure fault.
    #[serde(default = "default_step_retry_attempts")]
    pub step_retry_attempts: u32,

    #[serde(default = "default_step_retry_backoff_ms")]
    pub step_retry_backoff_ms: u64,

    /// Total tries for a store write that fails with a backend error.
    #[serde(default = "default_persist_retry_attempts")]
    pub persist_retry_attempts: u32,

    #[serde(default = "default_persist_retry_backoff_ms")]
    pub persist_retry_backoff_ms: u64,

    #[serde(default)]
    pub document_failure_policy: DocumentFailurePolicy,

    #[serde(default)]
    pub reconcile_policy: ReconcilePolicy,

    /// Capacity of the verification event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./docverify_data")
}

fn default_map_size() -> usize {
    1 << 30
}

fn default_true() -> bool {
    true
}

fn default_rpc_port() -> u16 {
    7077
}

fn default_ws_port() -> u16 {
    7078
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_pass_probability() -> f64 {
    0.8
}

fn default_min_latency_ms() -> u64 {
    2_000
}

fn default_max_latency_ms() -> u64 {
    4_000
}

fn default_step_retry_attempts() -> u32 {
    3
}

fn default_step_retry_backoff_ms() -> u64 {
    500
}

fn default_persist_retry_attempts() -> u32 {
    5
}

fn default_persist_retry_backoff_ms() -> u64 {
    100
}

fn default_event_capacity() -> usize {
    1024
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject values the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        self.verification.validate()?;
        if self.lmdb_map_size == 0 {
            return Err(NodeError::Config("lmdb_map_size must be positive".into()));
        }
        if self.enable_rpc && self.enable_websocket && self.rpc_port == self.websocket_port {
            return Err(NodeError::Config(format!(
                "rpc_port and websocket_port are both {}",
                self.rpc_port
            )));
        }
        Ok(())
    }
}

impl VerificationConfig {
    pub fn validate(&self) -> Result<(), NodeError> {
        if !(0.0..=1.0).contains(&self.pass_probability) {
            return Err(NodeError::Config(format!(
                "pass_probability must be within 0..=1, got {}",
                self.pass_probability
            )));
        }
        if self.min_step_latency_ms > self.max_step_latency_ms {
            return Err(NodeError::Config(format!(
                "min_step_latency_ms ({}) exceeds max_step_latency_ms ({})",
                self.min_step_latency_ms, self.max_step_latency_ms
            )));
        }
        Ok(())
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            step_retry: RetryPolicy::new(
                self.step_retry_attempts,
                Duration::from_millis(self.step_retry_backoff_ms),
            ),
            persist_retry: RetryPolicy::new(
                self.persist_retry_attempts,
                Duration::from_millis(self.persist_retry_backoff_ms),
            ),
            document_failure_policy: self.document_failure_policy,
            event_capacity: self.event_capacity,
        }
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            pass_probability: self.pass_probability,
            min_latency: Duration::from_millis(self.min_step_latency_ms),
            max_latency: Duration::from_millis(self.max_step_latency_ms),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            lmdb_map_size: default_map_size(),
            enable_rpc: default_true(),
            rpc_port: default_rpc_port(),
            enable_websocket: false,
            websocket_port: default_ws_port(),
            enable_metrics: false,
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            verification: VerificationConfig::default(),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            pass_probability: default_pass_probability(),
            min_step_latency_ms: default_min_latency_ms(),
            max_step_latency_ms: default_max_latency_ms(),
            step_retry_attempts: default_step_retry_attempts(),
            step_retry_backoff_ms: default_step_retry_backoff_ms(),
            persist_retry_attempts: default_persist_retry_attempts(),
            persist_retry_backoff_ms: default_persist_retry_backoff_ms(),
            document_failure_policy: DocumentFailurePolicy::default(),
            reconcile_policy: ReconcilePolicy::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.rpc_port, 7077);
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(config.verification.pass_probability, 0.8);
        assert_eq!(
            config.verification.document_failure_policy,
            DocumentFailurePolicy::LeavePending
        );
        assert_eq!(config.verification.reconcile_policy, ReconcilePolicy::Resume);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            rpc_port = 9999
            log_format = "json"

            [verification]
            document_failure_policy = "reject"
            reconcile_policy = "fail"
            step_retry_attempts = 1
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.rpc_port, 9999);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_level, "info"); // default
        assert_eq!(
            config.verification.document_failure_policy,
            DocumentFailurePolicy::Reject
        );
        assert_eq!(config.verification.reconcile_policy, ReconcilePolicy::Fail);
        assert_eq!(config.verification.orchestrator_config().step_retry.attempts, 1);
        assert_eq!(config.verification.persist_retry_attempts, 5);
    }

    #[test]
    fn simulation_config_uses_millis() {
        let sim = VerificationConfig::default().simulation_config();
        assert_eq!(sim.min_latency, Duration::from_secs(2));
        assert_eq!(sim.max_latency, Duration::from_secs(4));
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let toml = "[verification]\npass_probability = 1.5\n";
        assert!(matches!(
            NodeConfig::from_toml_str(toml),
            Err(NodeError::Config(_))
        ));
    }

    #[test]
    fn inverted_latency_range_is_rejected() {
        let toml = "[verification]\nmin_step_latency_ms = 10\nmax_step_latency_ms = 5\n";
        assert!(NodeConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn unknown_policy_is_a_config_error() {
        let toml = "[verification]\ndocument_failure_policy = \"shred\"\n";
        assert!(matches!(
            NodeConfig::from_toml_str(toml),
            Err(NodeError::Config(_))
        ));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/docverify.toml");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }
}
