//! Sends datagrams on a shared UDP socket.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::error::Result;

#[derive(Clone)]
pub struct UdpSender {
    socket: Arc<UdpSocket>,
}

impl UdpSender {
    pub fn new(socket: Arc<UdpSocket>) -> Result<Self> {
        Ok(UdpSender { socket })
    }

    pub async fn send(&self, bytes: &[u8], peer: SocketAddr) -> Result<()> {
        self.socket.send_to(bytes, peer).await?;
        Ok(())
    }
}
