//! Configuration for the monitor process.

use std::time::Duration;

use anyhow::{Context, Result};
use fairq_bus::BusEndpoints;
use fairq_id::{ClientId, QueueId};

use crate::identity::Identity;
use crate::policy::KillThreshold;

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this monitor process, for log correlation.
    pub client_id: ClientId,

    /// Queue gateway base URL.
    pub queue_url: String,

    /// The shared queue this cluster monitors.
    pub queue_id: QueueId,

    /// The two well-known bus endpoints.
    pub endpoints: BusEndpoints,

    /// Owner identity announced with submitted jobs.
    pub identity: Identity,

    /// Aggregator merge-and-broadcast period.
    pub tick_interval: Duration,

    /// Bounded-timeout window for bus receives.
    pub recv_timeout: Duration,

    /// Short interval for loading/status polls.
    pub poll_interval: Duration,

    /// Bound on each wait-for-execution call; timeouts are retried.
    pub wait_timeout: Duration,

    /// Retained event log capacity.
    pub event_log_capacity: usize,

    /// Occupancy budget for the running job.
    pub kill_threshold: KillThreshold,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Loose values fall back to defaults; the kill threshold and the
    /// endpoint addresses are parsed strictly, since a silently defaulted
    /// value there changes enforcement or splits the cluster.
    pub fn from_env() -> Result<Self> {
        let client_id = ClientId::new();

        let queue_url = std::env::var("FAIRQ_QUEUE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());

        let queue_id = std::env::var("FAIRQ_QUEUE_ID")
            .unwrap_or_else(|_| "qm-1".to_string())
            .parse::<QueueId>()
            .context("FAIRQ_QUEUE_ID")?;

        let mut endpoints = BusEndpoints::default();
        if let Ok(addr) = std::env::var("FAIRQ_EVENTS_ADDR") {
            endpoints.events = addr.parse().context("FAIRQ_EVENTS_ADDR")?;
        }
        if let Ok(addr) = std::env::var("FAIRQ_TABLE_ADDR") {
            endpoints.table = addr.parse().context("FAIRQ_TABLE_ADDR")?;
        }

        let kill_threshold = match std::env::var("FAIRQ_KILL_THRESHOLD") {
            Ok(token) => token
                .parse::<KillThreshold>()
                .context("FAIRQ_KILL_THRESHOLD")?,
            Err(_) => KillThreshold::default(),
        };

        let tick_interval = env_millis("FAIRQ_TICK_MS", 200);
        let recv_timeout = env_millis("FAIRQ_RECV_TIMEOUT_MS", 150);
        let poll_interval = env_millis("FAIRQ_POLL_MS", 100);
        let wait_timeout = env_millis("FAIRQ_WAIT_TIMEOUT_MS", 2_000);

        let event_log_capacity = std::env::var("FAIRQ_LOG_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(fairq_events::DEFAULT_LOG_CAPACITY);

        // Ambient identity lookup is the documented opt-in of from_env;
        // embedders that want an explicit identity set it afterwards.
        let identity = Identity::from_env();

        Ok(Self {
            client_id,
            queue_url,
            queue_id,
            endpoints,
            identity,
            tick_interval,
            recv_timeout,
            poll_interval,
            wait_timeout,
            event_log_capacity,
            kill_threshold,
        })
    }
}

fn env_millis(var: &str, default_ms: u64) -> Duration {
    let ms = std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}
