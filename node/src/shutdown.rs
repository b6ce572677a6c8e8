//! Graceful shutdown for the DocVerify node.
//!
//! Shutdown is a latched flag on a `tokio::sync::watch` channel. Once raised
//! it stays raised, so a task that subscribes after the fact still stops.

use tokio::signal;
use tokio::sync::watch;

/// Raises the shutdown flag, from an OS signal or from [`DocVerifyNode::stop`].
///
/// [`DocVerifyNode::stop`]: crate::DocVerifyNode::stop
pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

/// The receiving half held by each background task.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown has been requested, immediately if it already was.
    pub async fn recv(&mut self) {
        // A dropped controller counts as shutdown too.
        let _ = self.rx.wait_for(|raised| *raised).await;
    }
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// Block until SIGINT, SIGTERM or [`ShutdownController::shutdown`], then
    /// raise the flag for everyone else.
    pub async fn wait_for_signal(&self) {
        let mut requested = self.subscribe();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = requested.recv() => tracing::info!("shutdown requested"),
            _ = signal::ctrl_c() => tracing::info!("received SIGINT, shutting down"),
            _ = terminate => tracing::info!("received SIGTERM, shutting down"),
        }
        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn every_subscriber_is_notified() {
        let controller = ShutdownController::new();
        let mut a = controller.subscribe();
        let mut b = a.clone();
        controller.shutdown();
        a.recv().await;
        b.recv().await;
    }

    #[tokio::test]
    async fn late_subscriber_sees_earlier_shutdown() {
        let controller = ShutdownController::new();
        controller.shutdown();
        let mut late = controller.subscribe();
        tokio::time::timeout(Duration::from_secs(1), late.recv())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_for_signal_returns_if_already_shut_down() {
        let controller = ShutdownController::new();
        controller.shutdown();
        tokio::time::timeout(Duration::from_secs(1), controller.wait_for_signal())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn signal_stays_pending_until_raised() {
        let controller = ShutdownController::new();
        let mut rx = controller.subscribe();
        assert!(tokio::time::timeout(Duration::from_millis(20), rx.recv())
            .await
            .is_err());
        controller.shutdown();
        rx.recv().await;
    }
}
