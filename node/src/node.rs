//! The main DocVerify node struct. It wires storage, the verification engine
//! and the network servers together.

use std::sync::Arc;
use std::time::Duration;

use docverify_rpc::{RpcServer, RpcState};
use docverify_store_lmdb::{LmdbEnvironment, Migrator};
use docverify_verification::{
    ReconcileReport, SimulatedStepExecutor, StepExecutor, VerificationOrchestrator,
};
use docverify_websocket::{WebSocketServer, WsState};
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::event_relay::relay_events;
use crate::metrics::NodeMetrics;
use crate::shutdown::ShutdownController;

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// Channel capacity for WebSocket fan-out.
const WS_CHANNEL_CAPACITY: usize = 256;

/// A running DocVerify node.
pub struct DocVerifyNode {
    pub config: NodeConfig,
    pub env: Arc<LmdbEnvironment>,
    pub orchestrator: Arc<VerificationOrchestrator>,
    pub metrics: Arc<NodeMetrics>,
    pub shutdown: Arc<ShutdownController>,
    pub ws_state: Arc<WsState>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
    started: bool,
}

impl DocVerifyNode {
    /// Create a node with the simulated step executor.
    ///
    /// Opens the LMDB environment at `config.data_dir` and brings its schema
    /// up to date. Call [`start`](Self::start) to reconcile interrupted
    /// verifications and begin serving requests.
    pub async fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let executor = Arc::new(SimulatedStepExecutor::new(
            config.verification.simulation_config(),
        ));
        Self::with_executor(config, executor).await
    }

    /// Create a node that runs steps through `executor`.
    pub async fn with_executor(
        config: NodeConfig,
        executor: Arc<dyn StepExecutor>,
    ) -> Result<Self, NodeError> {
        config.validate()?;

        // Open LMDB storage
        let env = LmdbEnvironment::open(&config.data_dir, config.lmdb_map_size)?;
        Migrator::run(&env.meta_store())?;
        let env = Arc::new(env);

        let orchestrator = Arc::new(VerificationOrchestrator::new(
            Arc::new(env.document_store()),
            Arc::new(env.verification_store()),
            executor,
            config.verification.orchestrator_config(),
        ));

        let metrics = Arc::new(NodeMetrics::new()?);
        let shutdown = Arc::new(ShutdownController::new());

        // WebSocket shared state (always created; only served if enabled)
        let ws_state = Arc::new(WsState::new(WS_CHANNEL_CAPACITY));

        Ok(Self {
            config,
            env,
            orchestrator,
            metrics,
            shutdown,
            ws_state,
            task_handles: Vec::new(),
            started: false,
        })
    }

    /// Start all subsystems without waiting for a shutdown signal.
    ///
    /// 1. Spawns the event relay (metrics + WebSocket fan-out)
    /// 2. Reconciles verifications a previous process left `in-progress`
    /// 3. Starts the RPC server (if enabled)
    /// 4. Starts the WebSocket server (if enabled)
    pub async fn start_services(&mut self) -> Result<ReconcileReport, NodeError> {
        // ── Event relay ──────────────────────────────────────────────────
        let relay_handle = tokio::spawn(relay_events(
            self.orchestrator.subscribe(),
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.metrics),
            Arc::clone(&self.ws_state),
            self.shutdown.subscribe(),
        ));
        self.task_handles.push(relay_handle);

        // ── Reconciliation ───────────────────────────────────────────────
        let report = self
            .orchestrator
            .reconcile(self.config.verification.reconcile_policy)
            .await?;

        // ── RPC server (optional) ────────────────────────────────────────
        if self.config.enable_rpc {
            let mut rpc_state = RpcState::new(Arc::clone(&self.orchestrator));
            if self.config.enable_metrics {
                rpc_state = rpc_state.with_metrics(self.metrics.registry.clone());
            }
            let rpc_server = RpcServer::new(self.config.rpc_port, Arc::new(rpc_state));
            let mut shutdown_rx_rpc = self.shutdown.subscribe();

            let rpc_handle = tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = shutdown_rx_rpc.recv() => {
                        tracing::info!("RPC server shutting down");
                    }
                    result = rpc_server.start() => {
                        match result {
                            Ok(()) => tracing::info!("RPC server exited"),
                            Err(e) => tracing::error!("RPC server error: {e}"),
                        }
                    }
                }
            });
            self.task_handles.push(rpc_handle);
        }

        // ── WebSocket server (optional) ──────────────────────────────────
        if self.config.enable_websocket {
            let ws_server =
                WebSocketServer::with_state(self.config.websocket_port, Arc::clone(&self.ws_state));
            let mut shutdown_rx_ws = self.shutdown.subscribe();

            let ws_handle = tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = shutdown_rx_ws.recv() => {
                        tracing::info!("WebSocket server shutting down");
                    }
                    result = ws_server.start() => {
                        match result {
                            Ok(()) => tracing::info!("WebSocket server exited"),
                            Err(e) => tracing::error!("WebSocket server error: {e}"),
                        }
                    }
                }
            });
            self.task_handles.push(ws_handle);
        }

        self.started = true;
        tracing::info!(
            rpc = self.config.enable_rpc,
            websocket = self.config.enable_websocket,
            metrics = self.config.enable_metrics,
            "DocVerify node started"
        );
        Ok(report)
    }

    /// Start the node and block until a shutdown signal arrives.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        self.start_services().await?;
        self.shutdown.wait_for_signal().await;
        Ok(())
    }

    /// Stop the node gracefully.
    ///
    /// 1. Sends the shutdown signal to all background tasks.
    /// 2. Aborts live drive loops (their records stay `in-progress` for the
    ///    next reconciliation).
    /// 3. Flushes LMDB.
    /// 4. Waits for background tasks to complete (with timeout).
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        if !self.started {
            return Err(NodeError::NotStarted);
        }
        tracing::info!("DocVerify node stopping");

        // Signal all tasks
        self.shutdown.shutdown();

        self.orchestrator.shutdown().await;

        // Flush LMDB
        if let Err(e) = self.env.force_sync() {
            tracing::warn!("LMDB force_sync failed: {e}");
        } else {
            tracing::info!("LMDB flushed to disk");
        }

        // Wait for all spawned tasks with a timeout
        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all)
            .await
            .is_err()
        {
            tracing::warn!(
                "shutdown timeout ({:?}), some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
        }

        self.metrics.active_verifications.set(0);
        self.started = false;
        tracing::info!("DocVerify node stopped");
        Ok(())
    }
}
