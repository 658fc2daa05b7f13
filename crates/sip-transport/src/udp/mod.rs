//! UDP transport (§4.3): one socket, one receive loop, no per-peer
//! connection state. Framing is a single `DatagramFramer::frame` call per
//! packet — there is no reassembly for datagrams.

mod listener;
mod sender;

pub use listener::UdpListener;
pub use sender::UdpSender;

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use sip_core::Message;

use crate::codec::DatagramFramer;
use crate::error::{Error, Result};
use crate::transport::{Protocol, Transport, TransportEvent, TransportTuple};

const DEFAULT_CHANNEL_CAPACITY: usize = 100;

pub struct UdpTransport {
    inner: Arc<Inner>,
}

struct Inner {
    sender: UdpSender,
    listener: Arc<UdpListener>,
    closed: AtomicBool,
    events_tx: mpsc::Sender<TransportEvent>,
    framer: DatagramFramer,
}

impl Clone for UdpTransport {
    fn clone(&self) -> Self {
        UdpTransport {
            inner: self.inner.clone(),
        }
    }
}

impl UdpTransport {
    pub async fn bind(
        addr: SocketAddr,
        max_message_bytes: usize,
        channel_capacity: Option<usize>,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let capacity = channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(capacity);

        let listener = UdpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "SIP UDP transport bound");

        let sender = UdpSender::new(listener.clone_socket())?;

        let transport = UdpTransport {
            inner: Arc::new(Inner {
                sender,
                listener: Arc::new(listener),
                closed: AtomicBool::new(false),
                events_tx,
                framer: DatagramFramer::new(max_message_bytes),
            }),
        };

        transport.spawn_receive_loop();
        Ok((transport, events_rx))
    }

    fn spawn_receive_loop(&self) {
        let transport = self.clone();

        tokio::spawn(async move {
            let inner = &transport.inner;

            while !inner.closed.load(Ordering::Relaxed) {
                match inner.listener.receive().await {
                    Ok((packet, peer, local)) => {
                        let tuple = TransportTuple {
                            protocol: Protocol::Udp,
                            local,
                            peer,
                        };
                        debug!(%peer, len = packet.len(), "received UDP datagram");

                        match inner.framer.frame(&packet) {
                            Ok(Some(message)) => {
                                let event = TransportEvent::MessageReceived { message, tuple };
                                if inner.events_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {
                                // keep-alive ping, nothing to deliver
                            }
                            Err(e) => {
                                warn!(%peer, error = %e, "failed to frame UDP datagram");
                                let _ = inner
                                    .events_tx
                                    .send(TransportEvent::FrameError {
                                        peer,
                                        reason: e.to_string(),
                                    })
                                    .await;
                            }
                        }
                    }
                    Err(e) => {
                        if inner.closed.load(Ordering::Relaxed) {
                            break;
                        }
                        error!(error = %e, "error receiving UDP datagram");
                    }
                }
            }

            let _ = inner.events_tx.send(TransportEvent::Closed).await;
            info!("UDP receive loop terminated");
        });
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn protocol(&self) -> Protocol {
        Protocol::Udp
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner
            .listener
            .local_addr()
            .expect("bound UDP socket always has a local address")
    }

    async fn send(&self, peer: SocketAddr, message: &Message) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let bytes = message.to_bytes();
        debug!(%peer, len = bytes.len(), "sending UDP datagram");
        self.inner.sender.send(&bytes, peer).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.listener.local_addr() {
            Ok(addr) => write!(f, "UdpTransport({addr})"),
            Err(_) => write!(f, "UdpTransport(<unbound>)"),
        }
    }
}
