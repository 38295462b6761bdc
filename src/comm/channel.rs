// A bound UDP socket with its client slot and a serialized send path
//
// Several producers can send through one channel (acknowledgements from the
// control loop, frames from the camera). Each send holds the lock for exactly
// one `send_to` call.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{error, info, trace};

use super::client::ClientAddress;
use crate::config::{MAX_DATAGRAM, RECV_TIMEOUT};

/// What happened to an outbound datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// No datagram received yet, so nobody to send to
    NoDestination,
    /// Above the datagram cap, dropped
    Oversized,
    /// The socket refused or truncated the datagram
    Failed,
}

#[derive(Debug)]
pub struct UdpChannel {
    name: &'static str,
    socket: UdpSocket,
    local_port: u16,
    client: ClientAddress,
    send_lock: Mutex<()>,
    recv_timeout: Duration,
}

impl UdpChannel {
    /// Bind on all IPv4 interfaces; port 0 asks the OS for an ephemeral port
    pub async fn bind(name: &'static str, port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        Self::from_socket(name, socket)
    }

    pub fn from_socket(name: &'static str, socket: UdpSocket) -> io::Result<Self> {
        let local_port = socket.local_addr()?.port();
        info!("{} channel bound to UDP port {}", name, local_port);

        Ok(Self {
            name,
            socket,
            local_port,
            client: ClientAddress::new(),
            send_lock: Mutex::new(()),
            recv_timeout: RECV_TIMEOUT,
        })
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Port actually assigned at bind time
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn client(&self) -> &ClientAddress {
        &self.client
    }

    /// Wait for one datagram, `Ok(None)` when the receive timeout elapses.
    ///
    /// The sender becomes the channel's client address.
    pub async fn recv(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match tokio::time::timeout(self.recv_timeout, self.socket.recv_from(buf)).await {
            Err(_) => Ok(None),
            Ok(Ok((len, from))) => {
                trace!("{}: {} bytes from {}", self.name, len, from);
                self.client.observe(from);
                Ok(Some((len, from)))
            }
            Ok(Err(e)) => Err(e),
        }
    }

    /// Send one datagram to the current client, if there is one
    pub async fn send(&self, data: &[u8]) -> SendOutcome {
        let Some(dest) = self.client.get() else {
            return SendOutcome::NoDestination;
        };

        if data.len() > MAX_DATAGRAM {
            error!(
                "{}: invalid UDP packet size {} (max {})",
                self.name,
                data.len(),
                MAX_DATAGRAM
            );
            return SendOutcome::Oversized;
        }

        let _guard = self.send_lock.lock().await;
        match self.socket.send_to(data, dest).await {
            Ok(sent) if sent == data.len() => SendOutcome::Sent,
            Ok(sent) => {
                error!("{}: sent {} of {} bytes to {}", self.name, sent, data.len(), dest);
                SendOutcome::Failed
            }
            Err(e) => {
                error!("{}: send to {} failed: {}", self.name, dest, e);
                SendOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn loopback_channel() -> UdpChannel {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        UdpChannel::from_socket("test", socket)
            .unwrap()
            .with_recv_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_ephemeral_port_is_read_back() {
        let channel = UdpChannel::bind("test", 0).await.unwrap();
        assert_ne!(channel.local_port(), 0);
    }

    #[tokio::test]
    async fn test_send_without_client_is_skipped() {
        let channel = loopback_channel().await;
        assert_eq!(channel.send(b"hello").await, SendOutcome::NoDestination);
    }

    #[tokio::test]
    async fn test_timeout_is_not_an_error() {
        let channel = loopback_channel().await;
        let mut buf = [0u8; 16];
        assert!(channel.recv(&mut buf).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reply_goes_to_last_sender() {
        let channel = loopback_channel().await;
        let target = SocketAddr::from((Ipv4Addr::LOCALHOST, channel.local_port()));

        let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        peer.send_to(b"ping", target).await.unwrap();

        let mut buf = [0u8; 16];
        let (len, from) = channel.recv(&mut buf).await.unwrap().unwrap();
        assert_eq!(&buf[..len], b"ping");
        assert_eq!(from, peer.local_addr().unwrap());
        assert_eq!(channel.client().get(), Some(from));

        assert_eq!(channel.send(b"pong").await, SendOutcome::Sent);
        let (len, _) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"pong");
    }

    #[tokio::test]
    async fn test_oversized_datagram_dropped() {
        let channel = loopback_channel().await;
        channel
            .client()
            .observe(SocketAddr::from((Ipv4Addr::LOCALHOST, 9)));

        let frame = vec![0u8; MAX_DATAGRAM + 1];
        assert_eq!(channel.send(&frame).await, SendOutcome::Oversized);
    }
}
