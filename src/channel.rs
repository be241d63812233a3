//! Channel boundary between the core and the transport.
//!
//! The transmitter only depends on [`FrameChannel`]; the TCP realization
//! lives here as [`SocketChannel`], which pumps outbound messages through an
//! unbounded queue (fire-and-forget) and forwards inbound messages to a
//! receiver the caller owns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::protocol::{self, ClientMessage, ServerMessage};

/// What the send path needs from a transport.
pub trait FrameChannel: Send + Sync {
    /// Queue a message without blocking. Fails only when the transport is
    /// already gone.
    fn send(&self, msg: ClientMessage) -> Result<()>;

    fn is_connected(&self) -> bool;
}

/// Framed-TCP channel with one writer and one reader task.
pub struct SocketChannel {
    tx: mpsc::UnboundedSender<ClientMessage>,
    connected: Arc<AtomicBool>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl SocketChannel {
    /// Connect and spawn the pump tasks. Inbound [`ServerMessage`]s arrive on
    /// the returned receiver; when the peer goes away the receiver closes and
    /// `is_connected` flips to false.
    pub async fn connect(
        addr: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ServerMessage>)> {
        let stream = TcpStream::connect(addr).await?;
        let framed = protocol::message_stream(stream);
        let (mut sink, mut source) = framed.split();

        let connected = Arc::new(AtomicBool::new(true));
        let (tx, mut out_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<ServerMessage>();

        let writer_connected = Arc::clone(&connected);
        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let data = match bincode::serialize(&msg) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("failed to encode outbound message: {e}");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Bytes::from(data)).await {
                    warn!("connection lost while sending: {e}");
                    writer_connected.store(false, Ordering::Relaxed);
                    break;
                }
            }
        });

        let reader_connected = Arc::clone(&connected);
        let reader = tokio::spawn(async move {
            loop {
                match source.next().await {
                    Some(Ok(bytes)) => match bincode::deserialize::<ServerMessage>(&bytes) {
                        Ok(msg) => {
                            if in_tx.send(msg).is_err() {
                                // caller dropped the receiver
                                break;
                            }
                        }
                        Err(e) => {
                            debug!("dropping undecodable inbound message: {e}");
                        }
                    },
                    Some(Err(e)) => {
                        warn!("connection lost while receiving: {e}");
                        break;
                    }
                    None => break,
                }
            }
            reader_connected.store(false, Ordering::Relaxed);
        });

        Ok((
            Self {
                tx,
                connected,
                writer,
                reader,
            },
            in_rx,
        ))
    }

    /// Stop both pump tasks. Idempotent.
    pub fn close(&self) {
        self.connected.store(false, Ordering::Relaxed);
        self.writer.abort();
        self.reader.abort();
    }
}

impl FrameChannel for SocketChannel {
    fn send(&self, msg: ClientMessage) -> Result<()> {
        self.tx
            .send(msg)
            .map_err(|_| anyhow::anyhow!("channel writer is gone"))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Drop for SocketChannel {
    fn drop(&mut self) {
        self.close();
    }
}
