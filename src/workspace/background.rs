//! Background task handles
//!
//! Work the caller does not wait on (initial temp-project load, reconciliation
//! after folder changes) runs as a spawned task. Its failure, error or panic,
//! is reported in exactly one place: an `error!` event and a
//! `WorkspaceEvent::BackgroundFailed` broadcast.

use std::future::Future;
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error};

use crate::workspace::service::{WorkspaceError, WorkspaceEvent};

pub struct BackgroundTask {
    name: &'static str,
    work: AbortHandle,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    pub fn spawn<F>(
        name: &'static str,
        events_tx: broadcast::Sender<WorkspaceEvent>,
        future: F,
    ) -> Self
    where
        F: Future<Output = Result<(), WorkspaceError>> + Send + 'static,
    {
        let work = tokio::spawn(future);
        let abort = work.abort_handle();

        let handle = tokio::spawn(async move {
            let message = match work.await {
                Ok(Ok(())) => {
                    debug!(task = name, "Background task finished");
                    return;
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) if e.is_cancelled() => {
                    debug!(task = name, "Background task cancelled");
                    return;
                }
                Err(e) => format!("task panicked: {}", e),
            };

            error!(task = name, error = %message, "Background task failed");
            let _ = events_tx.send(WorkspaceEvent::BackgroundFailed {
                task: name.to_string(),
                message,
            });
        });

        Self {
            name,
            work: abort,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// Wait until the task and its failure reporting are done.
    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn abort(&self) {
        self.work.abort();
    }
}
