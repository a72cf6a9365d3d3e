//! Inbound side of the events channel.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::{BusError, Frame};

/// Frames buffered between the socket tasks and the consumer. Arrivals
/// beyond this while the consumer is busy are dropped, not queued.
const INBOUND_QUEUE_DEPTH: usize = 256;

/// Exclusive collector of the events channel.
///
/// Binding succeeds for exactly one process per cluster; every publisher
/// connection fans into a single bounded queue drained by [`recv`] or
/// [`next`]. Dropping the collector stops the accept loop and all
/// per-connection tasks.
///
/// [`recv`]: EventCollector::recv
/// [`next`]: EventCollector::next
#[derive(Debug)]
pub struct EventCollector {
    local_addr: SocketAddr,
    rx: mpsc::Receiver<Frame>,
    _shutdown: watch::Sender<bool>,
}

impl EventCollector {
    /// Binds the inbound endpoint.
    ///
    /// A concurrent owner yields [`BusError::EndpointOwned`]; callers
    /// treat that as the signal to fall back to mirror mode, not as a
    /// fault.
    pub async fn bind(addr: SocketAddr) -> Result<Self, BusError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::AddrInUse {
                BusError::EndpointOwned(addr)
            } else {
                BusError::Bind { addr, source }
            }
        })?;
        let local_addr = listener.local_addr()?;

        let (tx, rx) = mpsc::channel(INBOUND_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(accept_loop(listener, tx, shutdown_rx));

        debug!(%local_addr, "events channel bound");
        Ok(Self {
            local_addr,
            rx,
            _shutdown: shutdown_tx,
        })
    }

    /// The address actually bound (relevant when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bounded-timeout receive; `None` when the window elapses quietly.
    pub async fn recv(&mut self, timeout: Duration) -> Option<Frame> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next inbound frame; pends until one arrives.
    pub async fn next(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }
}

async fn accept_loop(
    listener: TcpListener,
    tx: mpsc::Sender<Frame>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "publisher connected");
                    tokio::spawn(read_publisher(stream, tx.clone(), shutdown.clone()));
                }
                Err(e) => warn!(error = %e, "accept failed on events channel"),
            },
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn read_publisher(
    stream: TcpStream,
    tx: mpsc::Sender<Frame>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match Frame::decode_line(&line) {
                    Ok(frame) => {
                        if tx.try_send(frame).is_err() {
                            // Best-effort channel: drop rather than stall
                            // the publisher's socket.
                            debug!("inbound queue full; frame dropped");
                        }
                    }
                    Err(e) => warn!(error = %e, "ignoring malformed frame"),
                },
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "publisher connection lost");
                    break;
                }
            },
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
