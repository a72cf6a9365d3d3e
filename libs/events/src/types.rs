//! Wire types shared by every component on the bus.

use chrono::{DateTime, Utc};
use fairq_id::{JobId, QueueId};
use serde::{Deserialize, Serialize};

/// Topic tokens used on the bus.
///
/// A message is an atomic `(topic, payload)` pair; these are the only two
/// topics in the protocol.
pub mod topics {
    /// A single lifecycle transition, published by a job owner.
    pub const EVENT: &str = "event";

    /// A full merged-table snapshot, published by the aggregator.
    pub const TABLE: &str = "table-snapshot";
}

/// Broadcastable status of a job, as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Halted,
    Canceled,
    Finished,
}

impl JobStatus {
    /// True once the job can no longer appear in the authoritative queue.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Halted => "halted",
            JobStatus::Canceled => "canceled",
            JobStatus::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Converts a chrono timestamp to wire time (Unix seconds, fractional).
pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1e6
}

/// Wire time for the current instant.
pub fn now_epoch() -> f64 {
    epoch_seconds(Utc::now())
}

/// One observed status transition for one submitted job.
///
/// Emitted once per transition by the owning process, delivered at most
/// once, and retained only inside the aggregator's bounded log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub status: JobStatus,
    /// When the transition was observed, Unix seconds.
    pub time: Option<f64>,
    /// Owner identity at submission time; `None` travels as null and
    /// displays as "unknown".
    pub user: Option<String>,
    pub id: JobId,
    pub queue_id: QueueId,
}

impl LifecycleEvent {
    /// An event observed right now by `user`.
    pub fn observed(status: JobStatus, id: JobId, queue_id: QueueId, user: Option<String>) -> Self {
        Self {
            status,
            time: Some(now_epoch()),
            user,
            id,
            queue_id,
        }
    }

    /// Whether this entry enriches the given authoritative job row.
    pub fn matches(&self, id: &JobId, queue_id: &QueueId, status: JobStatus) -> bool {
        self.status == status && &self.id == id && &self.queue_id == queue_id
    }
}

/// One row of the merged table.
///
/// Same wire shape as [`LifecycleEvent`]; semantically this is an
/// authoritative queue entry enriched (or not) from the retained log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub status: JobStatus,
    pub time: Option<f64>,
    pub user: Option<String>,
    pub id: JobId,
    pub queue_id: QueueId,
}

impl TableRow {
    /// A row with no enrichment source: owner and timestamp unknown.
    pub fn unenriched(status: JobStatus, id: JobId, queue_id: QueueId) -> Self {
        Self {
            status,
            time: None,
            user: None,
            id,
            queue_id,
        }
    }

    /// A row decorated with owner and timestamp from a matching event.
    pub fn enriched(status: JobStatus, id: JobId, queue_id: QueueId, event: &LifecycleEvent) -> Self {
        Self {
            status,
            time: event.time,
            user: event.user.clone(),
            id,
            queue_id,
        }
    }

    /// Seconds spent in the current status, if the timestamp is known.
    ///
    /// Clamped at zero so clock skew between processes never renders a
    /// negative waiting time.
    pub fn waiting_secs(&self, now: f64) -> Option<f64> {
        self.time.map(|t| (now - t).max(0.0))
    }
}
