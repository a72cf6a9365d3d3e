//! # fairq-events
//!
//! Lifecycle event types and the retained event log for the fairq monitor.
//!
//! ## Design Principles
//!
//! - Events are transient announcements of observed status transitions,
//!   delivered at most once and never replayed.
//! - The retained log is an enrichment source only: it decorates rows of
//!   the merged table with owner and timestamp, but is never authoritative
//!   for a job's existence or status.
//! - Retention is bounded; the oldest entry is evicted first.
//!
//! ## Wire Contract
//!
//! An event payload is `{status, time, user, id, queue_id}` where `time`
//! is Unix seconds (`float|null`) and `user` may be null. A table snapshot
//! is an ordered sequence of the same record shape, pending jobs in queue
//! order followed by the running job.

mod error;
mod log;
mod types;

pub use error::EventError;
pub use log::{EventLog, DEFAULT_LOG_CAPACITY};
pub use types::*;
