//! DocVerify daemon: entry point for running a DocVerify node.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use docverify_node::{init_logging, DocVerifyNode, LogFormat, NodeConfig};
use docverify_verification::{DocumentFailurePolicy, ReconcilePolicy};

#[derive(Parser)]
#[command(name = "docverify-daemon", about = "DocVerify document verification node")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "DOCVERIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the LMDB environment.
    #[arg(long, env = "DOCVERIFY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Disable the RPC server.
    #[arg(long, env = "DOCVERIFY_DISABLE_RPC")]
    disable_rpc: bool,

    /// RPC server port.
    #[arg(long, env = "DOCVERIFY_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Enable the WebSocket server.
    #[arg(long, env = "DOCVERIFY_ENABLE_WEBSOCKET")]
    websocket: bool,

    /// WebSocket server port.
    #[arg(long, env = "DOCVERIFY_WS_PORT")]
    websocket_port: Option<u16>,

    /// Enable the Prometheus metrics endpoint.
    #[arg(long, env = "DOCVERIFY_ENABLE_METRICS")]
    metrics: bool,

    /// Log format: "human" or "json".
    #[arg(long, env = "DOCVERIFY_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "DOCVERIFY_LOG_LEVEL")]
    log_level: Option<String>,

    /// What to do with a document whose verification fails.
    #[arg(long, value_parser = parse_failure_policy, env = "DOCVERIFY_DOCUMENT_FAILURE_POLICY")]
    document_failure_policy: Option<DocumentFailurePolicy>,

    /// What to do with verifications left in progress by a previous run.
    #[arg(long, value_parser = parse_reconcile_policy, env = "DOCVERIFY_RECONCILE_POLICY")]
    reconcile_policy: Option<ReconcilePolicy>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Node operations.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Run the node.
    Run,
    /// Print the effective configuration as TOML and exit.
    Config,
}

fn parse_failure_policy(s: &str) -> Result<DocumentFailurePolicy, String> {
    match s {
        "leave-pending" => Ok(DocumentFailurePolicy::LeavePending),
        "reject" => Ok(DocumentFailurePolicy::Reject),
        other => Err(format!("expected leave-pending or reject, got {other}")),
    }
}

fn parse_reconcile_policy(s: &str) -> Result<ReconcilePolicy, String> {
    match s {
        "resume" => Ok(ReconcilePolicy::Resume),
        "fail" => Ok(ReconcilePolicy::Fail),
        other => Err(format!("expected resume or fail, got {other}")),
    }
}

impl Cli {
    /// Layer CLI flags and env vars over the config file (or defaults).
    fn into_config(self) -> anyhow::Result<(NodeConfig, Command)> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => NodeConfig::default(),
        };

        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if self.disable_rpc {
            config.enable_rpc = false;
        }
        if let Some(port) = self.rpc_port {
            config.rpc_port = port;
        }
        config.enable_websocket |= self.websocket;
        if let Some(port) = self.websocket_port {
            config.websocket_port = port;
        }
        config.enable_metrics |= self.metrics;
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(policy) = self.document_failure_policy {
            config.verification.document_failure_policy = policy;
        }
        if let Some(policy) = self.reconcile_policy {
            config.verification.reconcile_policy = policy;
        }

        config.validate()?;
        Ok((config, self.command))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, command) = Cli::parse().into_config()?;

    match command {
        Command::Node { action } => match action {
            NodeAction::Config => {
                print!("{}", config.to_toml_string()?);
            }
            NodeAction::Run => {
                init_logging(config.log_format, &config.log_level)?;
                tracing::info!(
                    "Starting DocVerify node (data: {}, RPC:{}, WS:{})",
                    config.data_dir.display(),
                    if config.enable_rpc {
                        config.rpc_port.to_string()
                    } else {
                        "off".into()
                    },
                    if config.enable_websocket {
                        config.websocket_port.to_string()
                    } else {
                        "off".into()
                    },
                );

                let mut node = DocVerifyNode::new(config).await?;
                node.start().await?;

                tracing::info!("Shutdown signal received, stopping node");
                node.stop().await?;

                tracing::info!("DocVerify daemon exited cleanly");
            }
        },
    }

    Ok(())
}
