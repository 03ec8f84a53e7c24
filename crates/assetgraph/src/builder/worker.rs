//! Background task that owns the builder.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{ChangeQueue, IncrementalBuilder, ScanReport};
use crate::catalogue::CatalogueEvent;
use crate::error::{Error, Result};

enum Control {
    Flush(oneshot::Sender<()>),
    Scan(oneshot::Sender<Result<ScanReport>>),
    Shutdown,
}

/// Handle to a running builder worker.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) stops the
/// worker once its control channel closes.
#[derive(Debug)]
pub struct BuilderHandle {
    control: mpsc::UnboundedSender<Control>,
    task: JoinHandle<()>,
}

impl BuilderHandle {
    /// Wait until every event delivered before this call has been applied.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the worker has stopped.
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Control::Flush(tx))?;
        rx.await.map_err(|_| worker_gone())
    }

    /// Run a full catalogue scan on the worker.
    ///
    /// # Errors
    ///
    /// Returns the scan's own error, or `Error::Internal` if the worker has
    /// stopped.
    pub async fn full_scan(&self) -> Result<ScanReport> {
        let (tx, rx) = oneshot::channel();
        self.send(Control::Scan(tx))?;
        rx.await.map_err(|_| worker_gone())?
    }

    /// Apply pending events, then stop the worker and wait for it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the worker task panicked.
    pub async fn shutdown(self) -> Result<()> {
        // Already stopped is fine; the join below reports panics.
        let _ = self.control.send(Control::Shutdown);
        self.task
            .await
            .map_err(|e| Error::Internal(format!("builder worker failed: {e}")))
    }

    fn send(&self, message: Control) -> Result<()> {
        self.control.send(message).map_err(|_| worker_gone())
    }
}

fn worker_gone() -> Error {
    Error::Internal("builder worker is not running".to_string())
}

/// Start the worker on the current tokio runtime.
///
/// The worker drains `events` into a coalescing [`ChangeQueue`] and applies
/// them in order. Every `retry_interval` it retries stale nodes.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
#[must_use]
pub fn spawn(
    builder: IncrementalBuilder,
    events: mpsc::UnboundedReceiver<CatalogueEvent>,
    retry_interval: Duration,
) -> BuilderHandle {
    let (control, control_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(builder, events, control_rx, retry_interval));
    BuilderHandle { control, task }
}

async fn run(
    builder: IncrementalBuilder,
    mut events: mpsc::UnboundedReceiver<CatalogueEvent>,
    mut control: mpsc::UnboundedReceiver<Control>,
    retry_interval: Duration,
) {
    let mut queue = ChangeQueue::new();
    let mut retry = tokio::time::interval_at(Instant::now() + retry_interval, retry_interval);
    retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(?retry_interval, "Builder worker started");

    loop {
        tokio::select! {
            biased;

            message = control.recv() => {
                drain(&builder, &mut events, &mut queue).await;
                match message {
                    Some(Control::Flush(done)) => {
                        let _ = done.send(());
                    }
                    Some(Control::Scan(done)) => {
                        let _ = done.send(builder.full_scan().await);
                    }
                    Some(Control::Shutdown) | None => break,
                }
            }
            // Ahead of events so a steady event stream cannot starve retries.
            _ = retry.tick() => {
                builder.retry_stale().await;
            }
            Some(event) = events.recv() => {
                queue.push(event);
                drain(&builder, &mut events, &mut queue).await;
            }
        }
    }

    tracing::debug!(coalesced = queue.coalesced(), "Builder worker stopped");
}

/// Pull every event already delivered into the queue, then apply the queue.
async fn drain(
    builder: &IncrementalBuilder,
    events: &mut mpsc::UnboundedReceiver<CatalogueEvent>,
    queue: &mut ChangeQueue,
) {
    while let Ok(event) = events.try_recv() {
        queue.push(event);
    }
    while let Some(change) = queue.pop() {
        builder.apply(change).await;
    }
}
