//! The elected aggregator: merge, enforce, broadcast.
//!
//! Exactly one aggregator runs per cluster — whoever binds the events
//! endpoint first. On every tick it queries the queue service for the
//! authoritative pending list and running job, decorates each row from
//! the retained event log, halts a running job that has exceeded its
//! occupancy budget, and broadcasts the complete merged table. A failed
//! tick broadcasts nothing; subscribers keep their previous snapshot
//! rather than seeing a partial table.
//!
//! Event receipt and tick execution run in one task, so the log and the
//! table are mutated serially without any lock.

use std::sync::Arc;
use std::time::Duration;

use fairq_bus::{BusEndpoints, EventCollector, Frame, TableBroadcaster};
use fairq_events::{now_epoch, EventLog, JobStatus, TableRow};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::context::MonitorContext;
use crate::error::{MonitorError, Result};
use crate::policy::KillThreshold;
use crate::queue::{self, HaltOutcome, JobRef, QueueError, QueueService};
use crate::view::DisplayState;

/// Merges the authoritative queue with retained lifecycle events and
/// enforces the occupancy budget.
pub struct Aggregator {
    queue: Arc<dyn QueueService>,
    collector: EventCollector,
    broadcaster: TableBroadcaster,
    log: EventLog,
    tick_interval: Duration,
    threshold: watch::Receiver<KillThreshold>,
    state_tx: watch::Sender<DisplayState>,
}

impl Aggregator {
    /// Claims both channel endpoints.
    ///
    /// An `EndpointOwned` error on the events endpoint means another
    /// aggregator is already active; callers fall back to mirror mode
    /// (see [`crate::roles::assume_role`]).
    pub async fn bind(
        ctx: &MonitorContext,
        threshold: watch::Receiver<KillThreshold>,
    ) -> Result<Self> {
        let collector = EventCollector::bind(ctx.config().endpoints.events).await?;
        let broadcaster = TableBroadcaster::bind(ctx.config().endpoints.table).await?;
        let (state_tx, _) = watch::channel(DisplayState::default());

        Ok(Self {
            queue: ctx.queue(),
            collector,
            broadcaster,
            log: EventLog::with_capacity(ctx.config().event_log_capacity),
            tick_interval: ctx.config().tick_interval,
            threshold,
            state_tx,
        })
    }

    /// The endpoints actually bound (relevant when binding port 0).
    pub fn endpoints(&self) -> BusEndpoints {
        BusEndpoints {
            events: self.collector.local_addr(),
            table: self.broadcaster.local_addr(),
        }
    }

    /// Local copy of every snapshot this aggregator broadcasts.
    pub fn snapshots(&self) -> watch::Receiver<DisplayState> {
        self.state_tx.subscribe()
    }

    /// Operator action: halt whatever runs right now, no timer involved.
    pub async fn kill_running(&self) -> std::result::Result<Option<HaltOutcome>, QueueError> {
        queue::kill_running(self.queue.as_ref()).await
    }

    /// Runs until shutdown. Consumes the aggregator: the log and table
    /// have exactly one owner for the lifetime of the loop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            log_capacity = self.log.capacity(),
            "aggregator loop started"
        );

        let mut tick = tokio::time::interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.tick().await {
                        Ok(()) => {}
                        Err(MonitorError::Queue(e)) => {
                            warn!(error = %e, "queue service failed; nothing broadcast this tick");
                            self.state_tx.send_replace(DisplayState::Unavailable);
                        }
                        Err(e) => {
                            warn!(error = %e, "tick failed; nothing broadcast this tick");
                        }
                    }
                }
                frame = self.collector.next() => match frame {
                    Some(frame) => self.on_event(frame),
                    None => {
                        warn!("events collector stopped; aggregator exiting");
                        break;
                    }
                },
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!("aggregator shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One merge-enforce-broadcast cycle.
    async fn tick(&mut self) -> Result<()> {
        let pending = self.queue.list_pending_jobs().await?;
        let running = self.queue.get_running_job().await?;
        let now = now_epoch();

        let mut rows = Vec::with_capacity(pending.len() + 1);
        for job in &pending {
            rows.push(self.enrich(job, JobStatus::Pending));
        }
        if let Some(job) = &running {
            let row = self.enrich(job, JobStatus::Running);
            self.enforce_occupancy(job, &row, now).await;
            rows.push(row);
        }

        // Broadcast every tick, even unchanged or empty, so completed
        // jobs disappear promptly on every subscriber.
        let frame = Frame::table(&rows)?;
        self.broadcaster.publish(&frame)?;
        self.state_tx.send_replace(DisplayState::Table(rows));
        Ok(())
    }

    /// Halts the running job once its known age exceeds the budget.
    async fn enforce_occupancy(&self, job: &JobRef, row: &TableRow, now: f64) {
        // Unknown age is "do not touch": a job with no attached
        // timestamp is never preempted.
        let Some(age) = row.waiting_secs(now) else {
            return;
        };
        let threshold = *self.threshold.borrow();
        if !threshold.exceeded_by(age) {
            return;
        }

        info!(
            job_id = %job.id,
            age_secs = age as u64,
            threshold = %threshold,
            "occupancy budget exceeded; halting running job"
        );
        match self.queue.halt(job).await {
            Ok(outcome) => debug!(job_id = %job.id, ?outcome, "halt issued"),
            Err(e) => warn!(job_id = %job.id, error = %e, "halt failed; retrying next tick"),
        }
    }

    fn enrich(&self, job: &JobRef, status: JobStatus) -> TableRow {
        match self.log.lookup(&job.id, &job.queue_id, status) {
            Some(event) => TableRow::enriched(status, job.id.clone(), job.queue_id.clone(), event),
            None => TableRow::unenriched(status, job.id.clone(), job.queue_id.clone()),
        }
    }

    fn on_event(&mut self, frame: Frame) {
        match frame.decode_event() {
            Ok(event) => {
                if self
                    .log
                    .lookup(&event.id, &event.queue_id, event.status)
                    .is_some()
                {
                    // Duplicate or reused identifier; the newest entry
                    // wins at enrichment time.
                    debug!(job_id = %event.id, status = %event.status, "duplicate transition retained");
                }
                debug!(job_id = %event.id, status = %event.status, "lifecycle event retained");
                self.log.append(event);
            }
            Err(e) => warn!(error = %e, "ignoring undecodable frame on events channel"),
        }
    }
}
