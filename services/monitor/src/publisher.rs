//! Job submission and lifecycle announcement.
//!
//! The publisher owns the client side of the events channel: it submits
//! work to the queue service and announces the pending and running
//! transitions it observes. Announcements are best-effort; queue
//! connectivity problems during submission surface to the caller instead
//! of being masked as "still loading".

use std::sync::Arc;
use std::time::Duration;

use fairq_bus::{EventPublisher, Frame};
use fairq_events::{JobStatus, LifecycleEvent};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::context::MonitorContext;
use crate::error::Result;
use crate::identity::Identity;
use crate::queue::{
    CancelOutcome, HaltOutcome, JobHandle, JobRef, Program, QueueService, RemoteStatus,
    WaitOutcome,
};

/// Local progress of one submitted job.
///
/// Purely advisory feedback for the submitting process — never broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobProgress {
    #[default]
    Submitted,
    /// Queued, with the queue position when the service reports one.
    Waiting { position: Option<u32> },
    Running,
    /// Left the queue without running, or finished.
    Ended,
}

/// Submits jobs and announces their lifecycle transitions.
pub struct JobPublisher {
    queue: Arc<dyn QueueService>,
    events: EventPublisher,
    identity: Identity,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl JobPublisher {
    pub fn new(ctx: &MonitorContext) -> Self {
        Self {
            queue: ctx.queue(),
            events: EventPublisher::new(ctx.config().endpoints.events),
            identity: ctx.config().identity.clone(),
            poll_interval: ctx.config().poll_interval,
            wait_timeout: ctx.config().wait_timeout,
        }
    }

    /// Submits a program and waits for the queue to accept it.
    ///
    /// Polls at a short fixed interval while the job reports `loading`;
    /// the pending transition is announced the moment it is observed.
    /// Connectivity failures surface as errors here — submission is the
    /// one place where "unreachable" must not look like "slow".
    pub async fn submit(&mut self, program: &Program) -> Result<JobHandle> {
        let job = self.queue.enqueue(program).await?;
        info!(job_id = %job.id, queue_id = %job.queue_id, name = %program.name, "job submitted");

        loop {
            match self.queue.job_status(&job).await? {
                RemoteStatus::Loading => tokio::time::sleep(self.poll_interval).await,
                RemoteStatus::Pending => {
                    self.announce(JobStatus::Pending, &job).await;
                    break;
                }
                // Accepted and already past pending; watch() announces
                // whatever comes next.
                _ => break,
            }
        }

        Ok(JobHandle::new(Arc::clone(&self.queue), job))
    }

    /// Follows a job until it starts running or leaves the queue.
    ///
    /// Queue-position polling feeds only the local `progress` channel.
    /// The bounded wait is retried on timeout; that timeout is expected,
    /// not an error. Queue failures are logged and retried next cycle.
    pub async fn watch(
        &mut self,
        handle: &JobHandle,
        progress: &watch::Sender<JobProgress>,
        shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            let status = match handle.status().await {
                Ok(status) => status,
                Err(e) => {
                    warn!(job_id = %handle.id(), error = %e, "status poll failed; retrying");
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
            };

            match status {
                RemoteStatus::Loading => tokio::time::sleep(self.poll_interval).await,
                RemoteStatus::Pending => {
                    match handle.position_in_queue().await {
                        Ok(position) => {
                            let _ = progress.send(JobProgress::Waiting { position });
                        }
                        Err(e) => debug!(job_id = %handle.id(), error = %e, "position poll failed"),
                    }

                    match handle.wait_for_execution(self.wait_timeout).await {
                        Ok(WaitOutcome::Running) => {
                            self.announce(JobStatus::Running, handle.raw()).await;
                            let _ = progress.send(JobProgress::Running);
                            return;
                        }
                        Ok(WaitOutcome::TimedOut) => {}
                        Ok(WaitOutcome::Gone) => {
                            info!(job_id = %handle.id(), "job left the queue before running");
                            let _ = progress.send(JobProgress::Ended);
                            return;
                        }
                        Err(e) => {
                            warn!(job_id = %handle.id(), error = %e, "wait poll failed; retrying");
                            tokio::time::sleep(self.poll_interval).await;
                        }
                    }
                }
                RemoteStatus::Running => {
                    self.announce(JobStatus::Running, handle.raw()).await;
                    let _ = progress.send(JobProgress::Running);
                    return;
                }
                RemoteStatus::Done => {
                    let _ = progress.send(JobProgress::Ended);
                    return;
                }
            }
        }
    }

    /// Cancels a pending job. Idempotence is the queue service's call.
    pub async fn cancel(&self, handle: &JobHandle) -> Result<CancelOutcome> {
        Ok(handle.cancel().await?)
    }

    /// Halts a running job. Idempotence is the queue service's call.
    pub async fn halt(&self, handle: &JobHandle) -> Result<HaltOutcome> {
        Ok(handle.halt().await?)
    }

    async fn announce(&mut self, status: JobStatus, job: &JobRef) {
        let event = LifecycleEvent::observed(
            status,
            job.id.clone(),
            job.queue_id.clone(),
            self.identity.as_user(),
        );
        let frame = match Frame::event(&event) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "could not encode lifecycle event");
                return;
            }
        };
        // Best-effort: a lost announcement only means the row shows up
        // unenriched on other clients.
        match self.events.publish(&frame).await {
            Ok(()) => debug!(job_id = %job.id, status = %status, "lifecycle event announced"),
            Err(e) => warn!(job_id = %job.id, status = %status, error = %e, "failed to announce transition"),
        }
    }
}
