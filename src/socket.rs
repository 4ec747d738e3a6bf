//! Datagram transport abstraction.
//!
//! [`Transport`] is the seam between the reliability layer and whatever
//! carries datagrams.  [`Socket`] is a thin wrapper around
//! `tokio::net::UdpSocket`; [`crate::simulator::Simulator`] wraps any
//! transport with fault injection.  All protocol logic lives elsewhere;
//! this module owns only byte I/O.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// Maximum UDP payload size; the receive buffer is sized to it.
pub const MAX_DATAGRAM: usize = 65_535;

/// An unreliable, unordered, message-oriented datagram transport.
pub trait Transport: Send + Sync + 'static {
    /// Send one datagram to `dest`.
    fn send_to(&self, buf: &[u8], dest: SocketAddr)
        -> impl Future<Output = io::Result<usize>> + Send;

    /// Send one datagram to the connected peer.
    fn send(&self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Receive the next datagram into `buf`, returning its length and source.
    fn recv_from(&self, buf: &mut [u8])
        -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;

    /// The peer this transport is connected to, if any.
    fn peer_addr(&self) -> Option<SocketAddr>;
}

/// An async UDP socket.
///
/// All methods are `&self` so the socket can be shared across tasks.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    peer: Option<SocketAddr>,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            peer: None,
            inner,
        })
    }

    /// Pre-connect the socket to `peer`.  Afterwards segments go out via
    /// [`Transport::send`] and datagrams from other sources are filtered by
    /// the OS.
    pub async fn connect(mut self, peer: SocketAddr) -> io::Result<Self> {
        self.inner.connect(peer).await?;
        self.peer = Some(peer);
        Ok(self)
    }
}

impl Transport for Socket {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize> {
        self.inner.send_to(buf, dest).await
    }

    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.inner.send(buf).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_resolves_ephemeral_port() {
        let sock = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        assert_ne!(sock.local_addr.port(), 0);
        assert_eq!(sock.peer_addr(), None);
    }

    #[tokio::test]
    async fn connected_socket_reports_peer() {
        let a = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = Socket::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap()
            .connect(a.local_addr)
            .await
            .unwrap();
        assert_eq!(b.peer_addr(), Some(a.local_addr));

        b.send(b"ping").await.unwrap();
        let mut buf = [0u8; 16];
        let (n, from) = a.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(from, b.local_addr);
    }
}
