//! Outbound side of the table channel.

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::{BusError, Frame};

/// Frames a subscriber may fall behind before it starts losing them.
const FANOUT_QUEUE_DEPTH: usize = 16;

/// Exclusive broadcaster of the table channel.
///
/// Each published frame is serialized once and handed to every subscriber
/// currently connected. Subscribers that lag beyond the fanout queue lose
/// frames silently; a late joiner starts with the next publish.
pub struct TableBroadcaster {
    local_addr: SocketAddr,
    tx: broadcast::Sender<String>,
    _shutdown: watch::Sender<bool>,
}

impl TableBroadcaster {
    /// Binds the outbound endpoint.
    pub async fn bind(addr: SocketAddr) -> Result<Self, BusError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::AddrInUse {
                BusError::EndpointOwned(addr)
            } else {
                BusError::Bind { addr, source }
            }
        })?;
        let local_addr = listener.local_addr()?;

        let (tx, _) = broadcast::channel(FANOUT_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(accept_loop(listener, tx.clone(), shutdown_rx));

        debug!(%local_addr, "table channel bound");
        Ok(Self {
            local_addr,
            tx,
            _shutdown: shutdown_tx,
        })
    }

    /// The address actually bound (relevant when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Fans a frame out to the subscribers connected right now.
    ///
    /// Returns how many subscribers were handed the frame; zero when
    /// nobody is listening, which is not an error on an at-most-once
    /// channel.
    pub fn publish(&self, frame: &Frame) -> Result<usize, BusError> {
        let line = frame.encode_line()?;
        Ok(self.tx.send(line).unwrap_or(0))
    }
}

async fn accept_loop(
    listener: TcpListener,
    tx: broadcast::Sender<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "subscriber connected");
                    tokio::spawn(write_subscriber(stream, tx.subscribe(), shutdown.clone()));
                }
                Err(e) => warn!(error = %e, "accept failed on table channel"),
            },
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn write_subscriber(
    mut stream: TcpStream,
    mut rx: broadcast::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(mut line) => {
                    line.push('\n');
                    if stream.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "slow subscriber dropped frames");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
