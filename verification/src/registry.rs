//! Supervision of running drive loops.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use docverify_types::VerificationId;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::VerificationError;

struct Entry {
    handle: JoinHandle<()>,
    cancel: broadcast::Sender<()>,
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<VerificationId, Entry>,
    closed: bool,
}

/// Live drive loops keyed by verification id.
///
/// At most one task per id. A task removes its own entry when it finishes;
/// [`TaskRegistry::shutdown`] aborts whatever is left.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with [`VerificationError::ShuttingDown`] once
    /// [`TaskRegistry::shutdown`] has run.
    pub async fn ensure_open(&self) -> Result<(), VerificationError> {
        if self.inner.lock().await.closed {
            return Err(VerificationError::ShuttingDown);
        }
        Ok(())
    }

    /// Spawn the task built by `make`, handing it the receiving end of its
    /// cancellation channel.
    pub async fn spawn<F, Fut>(&self, id: VerificationId, make: F) -> Result<(), VerificationError>
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // Held across spawn + insert so the task cannot deregister before
        // it was registered.
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(VerificationError::ShuttingDown);
        }
        if inner.tasks.contains_key(&id) {
            return Err(VerificationError::AlreadyRunning(id));
        }

        let (cancel, cancel_rx) = broadcast::channel(1);
        let task = make(cancel_rx);
        let registry = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            task.await;
            registry.lock().await.tasks.remove(&id);
        });
        inner.tasks.insert(id, Entry { handle, cancel });
        Ok(())
    }

    /// Signal the task for `id`. Returns `false` if no such task is running.
    pub async fn cancel(&self, id: &VerificationId) -> bool {
        let inner = self.inner.lock().await;
        match inner.tasks.get(id) {
            Some(entry) => entry.cancel.send(()).is_ok(),
            None => false,
        }
    }

    pub async fn is_running(&self, id: &VerificationId) -> bool {
        self.inner.lock().await.tasks.contains_key(id)
    }

    pub async fn active_count(&self) -> usize {
        self.inner.lock().await.tasks.len()
    }

    /// Refuse new tasks, abort the running ones and wait for them to stop.
    pub async fn shutdown(&self) -> usize {
        let entries: Vec<(VerificationId, Entry)> = {
            let mut inner = self.inner.lock().await;
            inner.closed = true;
            inner.tasks.drain().collect()
        };
        let count = entries.len();
        for (_, entry) in &entries {
            entry.handle.abort();
        }
        for (id, entry) in entries {
            if let Err(e) = entry.handle.await {
                if !e.is_cancelled() {
                    tracing::warn!(%id, error = %e, "drive loop panicked");
                }
            }
        }
        count
    }
}
