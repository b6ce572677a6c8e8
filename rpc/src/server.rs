//! Axum-based RPC server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use docverify_verification::VerificationOrchestrator;
use prometheus::Registry;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::RpcError;
use crate::handlers;

/// Shared state handed to every handler.
pub struct RpcState {
    pub orchestrator: Arc<VerificationOrchestrator>,
    /// Registry served on `/metrics`; `None` when metrics are disabled.
    pub metrics: Option<Registry>,
}

impl RpcState {
    pub fn new(orchestrator: Arc<VerificationOrchestrator>) -> Self {
        Self {
            orchestrator,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, registry: Registry) -> Self {
        self.metrics = Some(registry);
        self
    }
}

/// Build the full route table.
pub fn router(state: Arc<RpcState>) -> Router {
    Router::new()
        .route("/verify/:document_id", post(handlers::start_verification))
        .route("/verification/:id", get(handlers::get_verification))
        .route("/verification/:id/cancel", post(handlers::cancel_verification))
        .route("/documents", post(handlers::create_document))
        .route("/documents/bulk", post(handlers::create_documents_bulk))
        .route("/documents/:id", get(handlers::get_document))
        .route("/dashboard/stats", get(handlers::dashboard_stats))
        .route("/dashboard/history", get(handlers::dashboard_history))
        .route("/dashboard/pending", get(handlers::dashboard_pending))
        .route("/metrics", get(handlers::metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct RpcServer {
    pub port: u16,
    state: Arc<RpcState>,
}

impl RpcServer {
    pub fn new(port: u16, state: Arc<RpcState>) -> Self {
        Self { port, state }
    }

    /// Bind to the configured port and serve until the task is dropped.
    pub async fn start(&self) -> Result<(), RpcError> {
        let app = router(Arc::clone(&self.state));
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| RpcError::Server(format!("failed to bind {addr}: {e}")))?;
        info!("RPC server listening on {}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}
