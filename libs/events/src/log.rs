//! The retained event log: a bounded FIFO of observed lifecycle events.

use std::collections::VecDeque;

use fairq_id::{JobId, QueueId};

use crate::{JobStatus, LifecycleEvent};

/// Default retention capacity.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Bounded FIFO of lifecycle events, oldest evicted first.
///
/// The log is consulted only to decorate merged-table rows with owner and
/// timestamp. It is never authoritative: a job exists exactly as long as
/// the queue service reports it, independent of when its entries age out.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<LifecycleEvent>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// A log retaining at most `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Appends an event, evicting the oldest entries beyond capacity.
    pub fn append(&mut self, event: LifecycleEvent) {
        self.entries.push_back(event);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Most recently appended event matching `(id, queue_id, status)`.
    ///
    /// Scans newest to oldest so a re-announced transition wins over an
    /// older duplicate.
    pub fn lookup(
        &self,
        id: &JobId,
        queue_id: &QueueId,
        status: JobStatus,
    ) -> Option<&LifecycleEvent> {
        self.entries
            .iter()
            .rev()
            .find(|event| event.matches(id, queue_id, status))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
