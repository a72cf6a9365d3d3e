//! Transport error types.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced by the bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// Another process already bound this inbound endpoint.
    ///
    /// Not a fault: this is the deterministic leader-election signal.
    #[error("endpoint {0} is already owned by another process")]
    EndpointOwned(SocketAddr),

    /// Binding an endpoint failed for a reason other than ownership.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Connecting to an endpoint failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Send or receive failed mid-stream.
    #[error("transport i/o: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("frame codec: {0}")]
    Codec(String),

    /// The peer closed the channel.
    #[error("channel closed by peer")]
    Closed,
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::Codec(err.to_string())
    }
}
