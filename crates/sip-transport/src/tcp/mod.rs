//! TCP transport (§4.3): a listener accepting inbound connections plus
//! dynamically opened outbound connections, each driven by its own
//! reassembly buffer and idle timer. A connection that sits idle past
//! `idle_timeout` is closed and evicted, surfacing
//! [`TransportEvent::ConnectionLost`] to whoever is watching.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use sip_core::Message;

use crate::codec::StreamFramer;
use crate::error::{Error, Result};
use crate::transport::{Protocol, Transport, TransportEvent, TransportTuple};

/// RFC-guidance default: 64 * T1 (T1 = 500ms).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(32);

struct Connection {
    write_tx: mpsc::Sender<Message>,
    _close_tx: oneshot::Sender<()>,
}

pub struct TcpTransport {
    inner: Arc<Inner>,
}

struct Inner {
    local_addr: SocketAddr,
    closed: AtomicBool,
    events_tx: mpsc::Sender<TransportEvent>,
    connections: Mutex<HashMap<SocketAddr, Connection>>,
    max_message_bytes: usize,
    idle_timeout: Duration,
}

impl Clone for TcpTransport {
    fn clone(&self) -> Self {
        TcpTransport {
            inner: self.inner.clone(),
        }
    }
}

impl TcpTransport {
    pub async fn bind(
        addr: SocketAddr,
        max_message_bytes: usize,
        idle_timeout: Duration,
        channel_capacity: Option<usize>,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let listener = TokioTcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "SIP TCP transport bound");

        let (events_tx, events_rx) = mpsc::channel(channel_capacity.unwrap_or(100));
        let transport = TcpTransport {
            inner: Arc::new(Inner {
                local_addr,
                closed: AtomicBool::new(false),
                events_tx,
                connections: Mutex::new(HashMap::new()),
                max_message_bytes,
                idle_timeout,
            }),
        };

        transport.spawn_accept_loop(listener);
        Ok((transport, events_rx))
    }

    fn spawn_accept_loop(&self, listener: TokioTcpListener) {
        let transport = self.clone();
        tokio::spawn(async move {
            loop {
                if transport.is_closed() {
                    break;
                }
                match listener.accept().await {
                    Ok((stream, peer)) => transport.adopt(stream, peer),
                    Err(e) => {
                        error!(error = %e, "TCP accept failed");
                        break;
                    }
                }
            }
        });
    }

    /// Opens (or reuses) an outbound connection to `peer`.
    pub async fn connect(&self, peer: SocketAddr) -> Result<()> {
        if self.inner.connections.lock().unwrap().contains_key(&peer) {
            return Ok(());
        }
        let stream = TcpStream::connect(peer).await?;
        self.adopt(stream, peer);
        Ok(())
    }

    fn adopt(&self, stream: TcpStream, peer: SocketAddr) {
        let local = stream
            .local_addr()
            .unwrap_or(self.inner.local_addr);
        let tuple = TransportTuple {
            protocol: Protocol::Tcp,
            local,
            peer,
        };

        let (write_tx, write_rx) = mpsc::channel::<Message>(32);
        let (close_tx, close_rx) = oneshot::channel();

        self.inner.connections.lock().unwrap().insert(
            peer,
            Connection {
                write_tx,
                _close_tx: close_tx,
            },
        );

        let transport = self.clone();
        tokio::spawn(async move {
            transport
                .run_connection(stream, tuple, write_rx, close_rx)
                .await;
        });
    }

    async fn run_connection(
        &self,
        mut stream: TcpStream,
        tuple: TransportTuple,
        mut write_rx: mpsc::Receiver<Message>,
        mut close_rx: oneshot::Receiver<()>,
    ) {
        let mut framer = StreamFramer::new(self.inner.max_message_bytes);
        let mut buf = vec![0u8; 8192];
        let idle = tokio::time::sleep(self.inner.idle_timeout);
        tokio::pin!(idle);

        let reason = loop {
            tokio::select! {
                _ = &mut close_rx => break "closed by caller".to_string(),
                _ = &mut idle => break "idle timeout".to_string(),
                outbound = write_rx.recv() => {
                    match outbound {
                        Some(message) => {
                            let bytes = message.to_bytes();
                            if let Err(e) = stream.write_all(&bytes).await {
                                break format!("write failed: {e}");
                            }
                            idle.as_mut().reset(tokio::time::Instant::now() + self.inner.idle_timeout);
                        }
                        None => break "sender dropped".to_string(),
                    }
                }
                read = stream.read(&mut buf) => {
                    match read {
                        Ok(0) => break "peer closed connection".to_string(),
                        Ok(n) => {
                            idle.as_mut().reset(tokio::time::Instant::now() + self.inner.idle_timeout);
                            framer.push(&buf[..n]);
                            match framer.drain() {
                                Ok((messages, pings)) => {
                                    let mut ping_reply_failed = None;
                                    for _ in 0..pings {
                                        // RFC 5626 §4.4: a double-CRLF keep-alive
                                        // gets a single-CRLF reply.
                                        if let Err(e) = stream.write_all(b"\r\n").await {
                                            ping_reply_failed = Some(e);
                                            break;
                                        }
                                    }
                                    if let Some(e) = ping_reply_failed {
                                        break format!("keep-alive reply failed: {e}");
                                    }
                                    for message in messages {
                                        debug!(peer = %tuple.peer, "received TCP message");
                                        let event = TransportEvent::MessageReceived { message, tuple };
                                        if self.inner.events_tx.send(event).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                                Err(e) => {
                                    warn!(peer = %tuple.peer, error = %e, "malformed start line, closing connection");
                                    break format!("frame error: {e}");
                                }
                            }
                        }
                        Err(e) => break format!("read failed: {e}"),
                    }
                }
            }
        };

        self.inner.connections.lock().unwrap().remove(&tuple.peer);
        let _ = self
            .inner
            .events_tx
            .send(TransportEvent::ConnectionLost { tuple, reason })
            .await;
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    async fn send(&self, peer: SocketAddr, message: &Message) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.connect(peer).await?;
        let write_tx = {
            let connections = self.inner.connections.lock().unwrap();
            connections
                .get(&peer)
                .map(|c| c.write_tx.clone())
                .ok_or_else(|| Error::NoRoute(peer.to_string()))?
        };
        write_tx
            .send(message.clone())
            .await
            .map_err(|_| Error::ConnectionReset(peer))
    }

    async fn close(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::Relaxed);
        self.inner.connections.lock().unwrap().clear();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TcpTransport({})", self.inner.local_addr)
    }
}
