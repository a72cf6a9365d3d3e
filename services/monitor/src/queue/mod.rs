//! The queue service boundary.
//!
//! The hardware execution queue is an external collaborator; this module
//! defines exactly the operations the monitor consumes from it, a handle
//! wrapper whose capability surface is auditable, an HTTP client for the
//! real gateway, and an in-memory simulator for tests and dev runs.

mod http;
mod mock;

pub use http::HttpQueueService;
pub use mock::MockQueueService;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fairq_id::{JobId, QueueId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A unit of work handed to the execution queue.
///
/// Compilation and execution are the hardware side's business; the
/// monitor treats the body as opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub body: serde_json::Value,
}

impl Program {
    pub fn new(name: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

/// Reference to one queue-side job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobRef {
    pub id: JobId,
    pub queue_id: QueueId,
}

/// Job status as the queue service itself reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// Submitted but not yet accepted into the queue.
    Loading,
    Pending,
    Running,
    /// Finished, canceled, or halted; no longer in the queue.
    Done,
}

impl std::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RemoteStatus::Loading => "loading",
            RemoteStatus::Pending => "pending",
            RemoteStatus::Running => "running",
            RemoteStatus::Done => "done",
        };
        f.write_str(s)
    }
}

/// Result of a cancel request. Racing a natural completion is a no-op,
/// never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Canceled,
    /// The job had already left the pending state.
    AlreadySettled,
}

/// Result of a halt request, same no-op contract as [`CancelOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltOutcome {
    Halted,
    /// The job was no longer running.
    AlreadySettled,
}

/// Result of one bounded wait for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The job reached the running state.
    Running,
    /// The bound elapsed first; expected, callers simply retry.
    TimedOut,
    /// The job left the queue without running (canceled externally).
    Gone,
}

/// Queue service failures.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Connectivity problem; must never be masked as "still loading".
    #[error("queue service unreachable: {0}")]
    Unavailable(String),

    /// The service answered but refused the request.
    #[error("queue service rejected the request: {0}")]
    Rejected(String),

    /// The job is unknown to the service.
    #[error("job {0} is not known to the queue service")]
    NotFound(JobId),

    /// The service answered with something we could not decode.
    #[error("malformed queue service response: {0}")]
    Malformed(String),
}

/// Operations the monitor consumes from the hardware queue.
///
/// Every call is a synchronous remote call bounded by its own timeout;
/// callers catch, degrade, and retry on their next cycle rather than
/// terminate.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// The queue this service fronts.
    fn queue_id(&self) -> &QueueId;

    async fn enqueue(&self, program: &Program) -> Result<JobRef, QueueError>;

    async fn job_status(&self, job: &JobRef) -> Result<RemoteStatus, QueueError>;

    /// Position among pending jobs; `None` once the job is not pending.
    async fn position_in_queue(&self, job: &JobRef) -> Result<Option<u32>, QueueError>;

    async fn cancel(&self, job: &JobRef) -> Result<CancelOutcome, QueueError>;

    async fn halt(&self, job: &JobRef) -> Result<HaltOutcome, QueueError>;

    /// Waits up to `timeout` for the job to start running.
    async fn wait_for_execution(
        &self,
        job: &JobRef,
        timeout: Duration,
    ) -> Result<WaitOutcome, QueueError>;

    /// Authoritative pending list, in queue order.
    async fn list_pending_jobs(&self) -> Result<Vec<JobRef>, QueueError>;

    /// The zero-or-one currently running job.
    async fn get_running_job(&self) -> Result<Option<JobRef>, QueueError>;
}

/// Halts whatever is running right now, unconditionally.
///
/// Operator action with no timer involved; `None` when the queue is idle.
pub async fn kill_running(queue: &dyn QueueService) -> Result<Option<HaltOutcome>, QueueError> {
    match queue.get_running_job().await? {
        Some(job) => Ok(Some(queue.halt(&job).await?)),
        None => Ok(None),
    }
}

/// Handle over one submitted job.
///
/// Exposes exactly the operations the monitor is allowed to drive. The
/// single passthrough to queue-side state is [`JobHandle::raw`], so the
/// capability surface stays auditable.
#[derive(Clone)]
pub struct JobHandle {
    queue: Arc<dyn QueueService>,
    job: JobRef,
}

impl JobHandle {
    pub fn new(queue: Arc<dyn QueueService>, job: JobRef) -> Self {
        Self { queue, job }
    }

    pub fn id(&self) -> &JobId {
        &self.job.id
    }

    pub fn queue_id(&self) -> &QueueId {
        &self.job.queue_id
    }

    /// The raw queue-side reference.
    pub fn raw(&self) -> &JobRef {
        &self.job
    }

    pub async fn status(&self) -> Result<RemoteStatus, QueueError> {
        self.queue.job_status(&self.job).await
    }

    pub async fn position_in_queue(&self) -> Result<Option<u32>, QueueError> {
        self.queue.position_in_queue(&self.job).await
    }

    pub async fn cancel(&self) -> Result<CancelOutcome, QueueError> {
        self.queue.cancel(&self.job).await
    }

    pub async fn halt(&self) -> Result<HaltOutcome, QueueError> {
        self.queue.halt(&self.job).await
    }

    pub async fn wait_for_execution(&self, timeout: Duration) -> Result<WaitOutcome, QueueError> {
        self.queue.wait_for_execution(&self.job, timeout).await
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle").field("job", &self.job).finish()
    }
}
