//! Process-wide context shared by every component.
//!
//! One context is constructed at startup and passed by reference into
//! each component's constructor. Nothing in this crate reaches for an
//! ambient global: the queue client, the endpoints, and the shutdown
//! signal all flow through here, and `shutdown()` is the single defined
//! way to wind the process down.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::Config;
use crate::queue::QueueService;

/// Shared construction context for monitor components.
pub struct MonitorContext {
    config: Config,
    queue: Arc<dyn QueueService>,
    shutdown_tx: watch::Sender<bool>,
}

impl MonitorContext {
    pub fn new(config: Config, queue: Arc<dyn QueueService>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            queue,
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A fresh handle on the shared queue client.
    pub fn queue(&self) -> Arc<dyn QueueService> {
        Arc::clone(&self.queue)
    }

    /// Stop flag observed by every component loop.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Requests cooperative shutdown.
    ///
    /// Each loop checks the flag at least once per poll cycle, so
    /// shutdown latency is bounded by one poll interval; in-flight remote
    /// calls are never interrupted.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
