//! Error taxonomy for the monitor.
//!
//! Two failure domains exist and stay separate:
//!
//! - *Transport*: the bus could not send or receive. Loops log and skip
//!   the iteration; stale display state persists until the next
//!   successful cycle.
//! - *Queue*: the queue service is unreachable or misbehaving. Loops
//!   degrade to an explicit "unavailable" display state and retry on the
//!   next cycle.
//!
//! A bind conflict on the events endpoint is not an error at all — it is
//! the leader-election signal handled in [`crate::roles`].

use fairq_bus::BusError;
use thiserror::Error;

use crate::queue::QueueError;

/// Top-level monitor error.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Bus send, receive, or bind failure.
    #[error("transport: {0}")]
    Transport(#[from] BusError),

    /// Queue service failure.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl MonitorError {
    /// True when this is the events-endpoint bind conflict.
    pub fn is_endpoint_owned(&self) -> bool {
        matches!(self, MonitorError::Transport(BusError::EndpointOwned(_)))
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
