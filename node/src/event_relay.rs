//! Background task fanning orchestrator events out to metrics and
//! WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use docverify_verification::{VerificationEvent, VerificationOrchestrator};
use docverify_websocket::WsState;
use tokio::sync::broadcast;

use crate::shutdown::ShutdownSignal;
use crate::NodeMetrics;

/// How often the active-verification gauge is refreshed when no events flow.
const GAUGE_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Consume `events` until shutdown or until the orchestrator goes away.
pub async fn relay_events(
    mut events: broadcast::Receiver<VerificationEvent>,
    orchestrator: Arc<VerificationOrchestrator>,
    metrics: Arc<NodeMetrics>,
    ws_state: Arc<WsState>,
    mut shutdown_rx: ShutdownSignal,
) {
    let mut refresh = tokio::time::interval(GAUGE_REFRESH_INTERVAL);
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                tracing::debug!("event relay shutting down");
                break;
            }
            received = events.recv() => match received {
                Ok(event) => {
                    metrics.observe(&event);
                    ws_state.publish(event);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event relay lagged behind the orchestrator");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = refresh.tick() => {}
        }
        metrics
            .active_verifications
            .set(orchestrator.active_count().await as i64);
    }
}
