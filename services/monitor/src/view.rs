//! Per-client view of the merged table.
//!
//! Subscribes to the table channel; every received snapshot fully
//! replaces the previous one (last message wins, no diffing). The view
//! tracks at most one job — the caller's own — and routes a user
//! cancellation to `cancel` or `halt` depending on the job's last-known
//! status, treating the action as terminal either way.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fairq_bus::TableSubscriber;
use fairq_events::{JobStatus, TableRow};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::context::MonitorContext;
use crate::error::Result;
use crate::queue::{JobHandle, JobRef, QueueService};

/// What a display sink should currently show.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayState {
    /// The queue service could not be reached; shown explicitly instead
    /// of a silently blanked table.
    Unavailable,
    /// The most recent complete snapshot.
    Table(Vec<TableRow>),
}

impl Default for DisplayState {
    fn default() -> Self {
        DisplayState::Table(Vec::new())
    }
}

impl DisplayState {
    pub fn rows(&self) -> &[TableRow] {
        match self {
            DisplayState::Table(rows) => rows,
            DisplayState::Unavailable => &[],
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, DisplayState::Unavailable)
    }
}

/// How a user cancellation request was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAction {
    /// The job was pending; `cancel` was issued.
    Canceled,
    /// The job was running; `halt` was issued.
    Halted,
    /// Nothing tracked, or the job was no longer in the queue.
    NothingToDo,
}

/// Table-channel subscriber bound to one client process.
pub struct LocalView {
    table_addr: SocketAddr,
    subscriber: Option<TableSubscriber>,
    queue: Arc<dyn QueueService>,
    recv_timeout: Duration,
    tracked: Option<JobRef>,
    state_tx: watch::Sender<DisplayState>,
}

impl LocalView {
    /// Connects to the table channel.
    pub async fn connect(ctx: &MonitorContext) -> Result<Self> {
        let table_addr = ctx.config().endpoints.table;
        let subscriber = TableSubscriber::connect(table_addr).await?;
        let (state_tx, _) = watch::channel(DisplayState::default());

        Ok(Self {
            table_addr,
            subscriber: Some(subscriber),
            queue: ctx.queue(),
            recv_timeout: ctx.config().recv_timeout,
            tracked: None,
            state_tx,
        })
    }

    /// Snapshots for a display sink; each value fully replaces the last.
    pub fn snapshots(&self) -> watch::Receiver<DisplayState> {
        self.state_tx.subscribe()
    }

    /// Starts tracking the caller's own job for highlighting and
    /// cancellation routing.
    pub fn track(&mut self, handle: &JobHandle) {
        self.tracked = Some(handle.raw().clone());
    }

    /// The tracked job, if any.
    pub fn tracked(&self) -> Option<&JobRef> {
        self.tracked.as_ref()
    }

    /// Applies one received snapshot, fully replacing the previous one.
    ///
    /// Exposed so embedders without a background loop can drive the view
    /// from their own receive cycle.
    pub fn replace_table(&mut self, rows: Vec<TableRow>) {
        self.state_tx.send_replace(DisplayState::Table(rows));
    }

    /// Status of the tracked job in the most recent snapshot.
    pub fn last_known_status(&self) -> Option<JobStatus> {
        let tracked = self.tracked.as_ref()?;
        self.state_tx
            .borrow()
            .rows()
            .iter()
            .find(|row| row.id == tracked.id && row.queue_id == tracked.queue_id)
            .map(|row| row.status)
    }

    /// Runs until shutdown, checking the stop flag once per poll cycle.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) {
        info!(addr = %self.table_addr, "local view subscribed to table channel");

        loop {
            if *shutdown.borrow() {
                info!("local view shutting down");
                break;
            }

            let Some(subscriber) = self.subscriber.as_mut() else {
                // Broadcaster went away. Keep the stale snapshot on
                // display and try to rejoin next cycle.
                tokio::time::sleep(self.recv_timeout).await;
                match TableSubscriber::connect(self.table_addr).await {
                    Ok(subscriber) => self.subscriber = Some(subscriber),
                    Err(e) => debug!(error = %e, "table channel not reachable yet"),
                }
                continue;
            };

            match subscriber.recv(self.recv_timeout).await {
                Ok(Some(frame)) => match frame.decode_table() {
                    Ok(rows) => self.replace_table(rows),
                    Err(e) => warn!(error = %e, "ignoring undecodable snapshot"),
                },
                // Quiet window; nothing to update.
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "table channel receive failed");
                    self.subscriber = None;
                }
            }
        }
    }

    /// User action: cancel the tracked job.
    ///
    /// Pending jobs are canceled, running jobs are halted. The job stops
    /// being tracked no matter what the queue service reports afterwards.
    pub async fn cancel_tracked(&mut self) -> Result<CancelAction> {
        let status = self.last_known_status();
        let Some(job) = self.tracked.take() else {
            return Ok(CancelAction::NothingToDo);
        };

        match status {
            Some(JobStatus::Pending) => {
                self.queue.cancel(&job).await?;
                Ok(CancelAction::Canceled)
            }
            Some(JobStatus::Running) => {
                self.queue.halt(&job).await?;
                Ok(CancelAction::Halted)
            }
            _ => Ok(CancelAction::NothingToDo),
        }
    }
}
