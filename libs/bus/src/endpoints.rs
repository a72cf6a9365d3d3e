//! Fixed endpoint pair for one monitoring cluster.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Default port of the events channel.
pub const DEFAULT_EVENTS_PORT: u16 = 5556;

/// Default port of the table channel.
pub const DEFAULT_TABLE_PORT: u16 = 5557;

/// The two well-known endpoints every process in a cluster agrees on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusEndpoints {
    /// Inbound endpoint of the events channel (bound by the aggregator).
    pub events: SocketAddr,
    /// Outbound endpoint of the table channel (bound by the aggregator).
    pub table: SocketAddr,
}

impl Default for BusEndpoints {
    fn default() -> Self {
        Self::loopback(DEFAULT_EVENTS_PORT, DEFAULT_TABLE_PORT)
    }
}

impl BusEndpoints {
    /// Endpoints on the loopback interface with explicit ports.
    pub fn loopback(events_port: u16, table_port: u16) -> Self {
        let host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        Self {
            events: SocketAddr::new(host, events_port),
            table: SocketAddr::new(host, table_port),
        }
    }
}
