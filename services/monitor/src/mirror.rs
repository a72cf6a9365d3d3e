//! Degraded-mode monitor for processes that lost the election.
//!
//! When another process already owns the events endpoint, this one
//! cannot see lifecycle events. The mirror polls the queue service
//! directly at a fixed interval and produces a table with owner and
//! timestamp unknown, local to this process only — it never publishes on
//! the table channel.

use std::sync::Arc;
use std::time::Duration;

use fairq_events::{JobStatus, TableRow};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::context::MonitorContext;
use crate::queue::{self, HaltOutcome, QueueError, QueueService};
use crate::view::DisplayState;

/// Direct queue poller with no cross-client enrichment.
pub struct Mirror {
    queue: Arc<dyn QueueService>,
    poll_interval: Duration,
    state_tx: watch::Sender<DisplayState>,
}

impl Mirror {
    pub fn new(ctx: &MonitorContext) -> Self {
        let (state_tx, _) = watch::channel(DisplayState::default());
        Self {
            queue: ctx.queue(),
            poll_interval: ctx.config().tick_interval,
            state_tx,
        }
    }

    /// Snapshots of the unenriched table, local to this process.
    pub fn snapshots(&self) -> watch::Receiver<DisplayState> {
        self.state_tx.subscribe()
    }

    /// Runs until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            "mirror loop started; no cross-client enrichment available"
        );

        let mut tick = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = tick.tick() => match self.poll().await {
                    Ok(rows) => {
                        self.state_tx.send_replace(DisplayState::Table(rows));
                    }
                    Err(e) => {
                        warn!(error = %e, "queue poll failed; retrying next cycle");
                        self.state_tx.send_replace(DisplayState::Unavailable);
                    }
                },
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!("mirror shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn poll(&self) -> std::result::Result<Vec<TableRow>, QueueError> {
        let pending = self.queue.list_pending_jobs().await?;
        let running = self.queue.get_running_job().await?;

        let mut rows: Vec<TableRow> = pending
            .into_iter()
            .map(|job| TableRow::unenriched(JobStatus::Pending, job.id, job.queue_id))
            .collect();
        if let Some(job) = running {
            rows.push(TableRow::unenriched(JobStatus::Running, job.id, job.queue_id));
        }
        Ok(rows)
    }

    /// Operator action: halt whatever runs right now, no timer involved.
    pub async fn kill(&self) -> std::result::Result<Option<HaltOutcome>, QueueError> {
        queue::kill_running(self.queue.as_ref()).await
    }
}
