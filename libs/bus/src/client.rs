//! Outbound publisher and table subscriber used by client processes.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;

use crate::{BusError, Frame};

/// Best-effort publisher on the events channel.
///
/// Connects lazily on the first publish; a failed send drops the
/// connection so the next publish reconnects. Nothing is ever queued or
/// retried on the caller's behalf.
pub struct EventPublisher {
    addr: SocketAddr,
    conn: Option<TcpStream>,
}

impl EventPublisher {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, conn: None }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends one frame, connecting first if necessary.
    pub async fn publish(&mut self, frame: &Frame) -> Result<(), BusError> {
        let mut line = frame.encode_line()?;
        line.push('\n');

        if self.conn.is_none() {
            let stream = TcpStream::connect(self.addr).await.map_err(|source| {
                BusError::Connect {
                    addr: self.addr,
                    source,
                }
            })?;
            self.conn = Some(stream);
        }

        if let Some(stream) = self.conn.as_mut() {
            if let Err(source) = stream.write_all(line.as_bytes()).await {
                self.conn = None;
                return Err(BusError::Io(source));
            }
        }
        Ok(())
    }
}

/// Subscriber on the table channel.
///
/// Receives whole snapshots with a bounded-timeout `recv`; a subscriber
/// that connects late sees nothing published before it joined.
pub struct TableSubscriber {
    addr: SocketAddr,
    lines: Lines<BufReader<TcpStream>>,
}

impl TableSubscriber {
    pub async fn connect(addr: SocketAddr) -> Result<Self, BusError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| BusError::Connect { addr, source })?;
        Ok(Self {
            addr,
            lines: BufReader::new(stream).lines(),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bounded-timeout receive.
    ///
    /// `Ok(None)` when the window elapses with nothing to read — the
    /// normal idle case. [`BusError::Closed`] once the broadcaster goes
    /// away.
    pub async fn recv(&mut self, timeout: Duration) -> Result<Option<Frame>, BusError> {
        match tokio::time::timeout(timeout, self.lines.next_line()).await {
            Err(_) => Ok(None),
            Ok(Ok(Some(line))) => Ok(Some(Frame::decode_line(&line)?)),
            Ok(Ok(None)) => Err(BusError::Closed),
            Ok(Err(source)) => Err(BusError::Io(source)),
        }
    }
}
