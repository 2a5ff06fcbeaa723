use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// The unreliable data channel: a thin wrapper over a UDP socket carrying
/// frame datagrams (spec §2 Transport, §6). Best-effort, no retransmission
/// (spec §1 Non-goals) — loss is handled entirely by the reassembler and
/// recovery taxonomy upstream.
pub struct DataChannel {
    socket: UdpSocket,
}

impl DataChannel {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        tracing::info!(local_addr = ?socket.local_addr()?, "data channel bound");
        Ok(Self { socket })
    }

    #[must_use]
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn send_to(&self, bytes: &[u8], target: SocketAddr) -> std::io::Result<usize> {
        self.socket.send_to(bytes, target).await
    }

    pub async fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}
