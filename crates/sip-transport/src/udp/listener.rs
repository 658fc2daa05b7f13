//! Binds a UDP socket and receives datagrams off it.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::error::Result;

pub struct UdpListener {
    socket: Arc<UdpSocket>,
}

impl UdpListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(UdpListener {
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn clone_socket(&self) -> Arc<UdpSocket> {
        self.socket.clone()
    }

    /// Receives one datagram, returning its bytes, the peer it came from, and
    /// this listener's local address.
    pub async fn receive(&self) -> Result<(Vec<u8>, SocketAddr, SocketAddr)> {
        let mut buf = vec![0u8; 65_535];
        let (len, peer) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        let local = self.socket.local_addr()?;
        Ok((buf, peer, local))
    }
}
