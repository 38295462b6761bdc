// Zero-configuration discovery over IPv4 multicast
//
// The controller multicasts a fixed probe string; the rover answers the sender
// directly with the ports its control and stream channels were bound to. Any
// socket failure tears the listener down and rebinds it after a backoff delay.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::{debug, error, info};

use super::backoff::Backoff;
use crate::config::{DiscoverySettings, PROBE, PROBE_MATCH_PREFIX, RECV_TIMEOUT};

/// Response advertised for a pair of bound ports
pub fn probe_match(control_port: u16, stream_port: u16) -> String {
    format!("{}:{}:{}", PROBE_MATCH_PREFIX, control_port, stream_port)
}

#[derive(Debug)]
pub struct DiscoveryResponder {
    settings: DiscoverySettings,
    response: Vec<u8>,
    backoff: Backoff,
    recv_timeout: Duration,
}

impl DiscoveryResponder {
    pub fn new(settings: DiscoverySettings, control_port: u16, stream_port: u16) -> Self {
        Self {
            settings,
            response: probe_match(control_port, stream_port).into_bytes(),
            backoff: Backoff::default(),
            recv_timeout: RECV_TIMEOUT,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn response(&self) -> &[u8] {
        &self.response
    }

    /// The reply for a received payload; only an exact probe gets one
    pub fn reply_to(&self, payload: &[u8]) -> Option<&[u8]> {
        (payload == PROBE).then_some(self.response.as_slice())
    }

    /// Bind the discovery port and join the multicast group
    pub async fn bind(&self) -> io::Result<UdpSocket> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.settings.port)).await?;
        socket.set_multicast_ttl_v4(self.settings.ttl)?;
        socket.join_multicast_v4(self.settings.group, Ipv4Addr::UNSPECIFIED)?;

        info!(
            "Discovery joined {}:{} (ttl {})",
            self.settings.group, self.settings.port, self.settings.ttl
        );
        Ok(socket)
    }

    /// Answer probes until the socket fails, returning the failure
    pub async fn serve(&self, socket: &UdpSocket) -> io::Error {
        let mut buf = [0u8; 64];

        loop {
            let (len, from) =
                match tokio::time::timeout(self.recv_timeout, socket.recv_from(&mut buf)).await {
                    Err(_) => continue,
                    Ok(Ok(received)) => received,
                    Ok(Err(e)) => return e,
                };

            let payload = &buf[..len];
            info!(
                "Discovery: {} bytes from {}: {}",
                len,
                from,
                String::from_utf8_lossy(payload)
            );

            if let Some(reply) = self.reply_to(payload) {
                if let Err(e) = self.reply(socket, reply, from).await {
                    return e;
                }
            } else {
                debug!("Discovery: ignoring non-probe payload from {}", from);
            }
        }
    }

    async fn reply(&self, socket: &UdpSocket, reply: &[u8], to: SocketAddr) -> io::Result<()> {
        socket.send_to(reply, to).await?;
        info!("Discovery: answered probe from {}", to);
        Ok(())
    }

    /// Serve forever, rebinding after every failure
    pub async fn run(mut self) {
        info!(
            "Discovery responder advertising {}",
            String::from_utf8_lossy(&self.response)
        );

        loop {
            let started = Instant::now();

            match self.bind().await {
                Ok(socket) => {
                    let e = self.serve(&socket).await;
                    error!("Discovery socket failed: {}", e);
                }
                Err(e) => error!("Failed to create IPv4 multicast socket: {}", e),
            }

            self.backoff.session_ended(started.elapsed());
            let delay = self.backoff.fail();
            error!(
                "Restarting discovery in {:?} (failure {})",
                delay,
                self.backoff.failures()
            );
            tokio::time::sleep(delay).await;
        }
    }
}
