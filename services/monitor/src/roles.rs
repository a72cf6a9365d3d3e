//! Leader election by bind conflict.
//!
//! Whoever binds the events endpoint first runs the aggregator; every
//! other process gets a deterministic `EndpointOwned` and falls back to
//! the mirror. No coordination protocol, no timeouts: the operating
//! system's exclusive bind is the election.

use fairq_bus::BusError;
use tokio::sync::watch;
use tracing::info;

use crate::aggregator::Aggregator;
use crate::context::MonitorContext;
use crate::error::{MonitorError, Result};
use crate::mirror::Mirror;
use crate::policy::KillThreshold;

/// Which side of the election this process landed on.
pub enum Role {
    Aggregator(Aggregator),
    Mirror(Mirror),
}

/// Binds the events endpoint or falls back to mirror mode.
pub async fn assume_role(
    ctx: &MonitorContext,
    threshold: watch::Receiver<KillThreshold>,
) -> Result<Role> {
    match Aggregator::bind(ctx, threshold).await {
        Ok(aggregator) => {
            info!("events endpoint acquired; running as aggregator");
            Ok(Role::Aggregator(aggregator))
        }
        Err(MonitorError::Transport(BusError::EndpointOwned(addr))) => {
            info!(%addr, "another aggregator is active; falling back to mirror mode");
            Ok(Role::Mirror(Mirror::new(ctx)))
        }
        Err(e) => Err(e),
    }
}
