// Camera frame forwarding
//
// Each frame becomes exactly one datagram to the streaming client: no header,
// no fragmentation, no queueing. Frames above the datagram cap or with nobody
// to receive them are dropped. The controller keeps itself registered by
// sending keep-alives to the stream port, which the listener loop picks up.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::backoff::Backoff;
use super::channel::{SendOutcome, UdpChannel};

// How often the forwarded frame rate is logged
pub const FPS_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct FpsWindow {
    started: Instant,
    frames: u32,
}

#[derive(Debug)]
pub struct StreamForwarder {
    channel: Arc<UdpChannel>,
    window: Mutex<FpsWindow>,
}

impl StreamForwarder {
    pub fn new(channel: Arc<UdpChannel>) -> Self {
        Self {
            channel,
            window: Mutex::new(FpsWindow {
                started: Instant::now(),
                frames: 0,
            }),
        }
    }

    pub fn channel(&self) -> &UdpChannel {
        &self.channel
    }

    /// Send one frame to the streaming client
    pub async fn forward(&self, frame: &[u8]) -> SendOutcome {
        let outcome = self.channel.send(frame).await;
        if outcome == SendOutcome::Sent {
            self.count_frame();
        }
        outcome
    }

    fn count_frame(&self) {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        window.frames += 1;

        let elapsed = window.started.elapsed();
        if elapsed >= FPS_WINDOW {
            info!(
                "Streaming FPS: {:.1}",
                window.frames as f64 / elapsed.as_secs_f64()
            );
            window.started = Instant::now();
            window.frames = 0;
        }
    }

    /// Track the streaming client from whatever it sends to the stream port
    pub async fn listen(self: Arc<Self>) {
        info!(
            "Stream forwarder listening on UDP port {}",
            self.channel.local_port()
        );

        let mut buf = [0u8; 64];
        let mut backoff = Backoff::default();

        loop {
            match self.channel.recv(&mut buf).await {
                Ok(_) => backoff.reset(),
                Err(e) => {
                    let delay = backoff.fail();
                    warn!("Stream receive failed: {}, retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_DATAGRAM;
    use std::net::{Ipv4Addr, SocketAddr};
    use tokio::net::UdpSocket;

    async fn forwarder() -> Arc<StreamForwarder> {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let channel = UdpChannel::from_socket("stream", socket)
            .unwrap()
            .with_recv_timeout(Duration::from_millis(50));
        Arc::new(StreamForwarder::new(Arc::new(channel)))
    }

    #[tokio::test]
    async fn test_no_client_skips_frame() {
        let forwarder = forwarder().await;
        assert_eq!(forwarder.forward(b"frame").await, SendOutcome::NoDestination);
    }

    #[tokio::test]
    async fn test_large_frame_is_sent_whole() {
        let forwarder = forwarder().await;
        let receiver = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        forwarder
            .channel()
            .client()
            .observe(receiver.local_addr().unwrap());

        let frame = vec![0xAB; 32 * 1024];
        assert_eq!(forwarder.forward(&frame).await, SendOutcome::Sent);

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, frame.len());

        let oversized = vec![0u8; MAX_DATAGRAM + 1];
        assert_eq!(forwarder.forward(&oversized).await, SendOutcome::Oversized);
    }

    #[tokio::test]
    async fn test_keep_alive_registers_client() {
        let forwarder = forwarder().await;
        let listener = tokio::spawn(forwarder.clone().listen());

        let controller = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let target = SocketAddr::from((Ipv4Addr::LOCALHOST, forwarder.channel().local_port()));
        controller.send_to(&[5, 0, 0, 0, 0, b'a'], target).await.unwrap();

        let expected = controller.local_addr().unwrap();
        for _ in 0..100 {
            if forwarder.channel().client().get() == Some(expected) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(forwarder.channel().client().get(), Some(expected));

        assert_eq!(forwarder.forward(b"jpeg").await, SendOutcome::Sent);
        let mut buf = [0u8; 16];
        let (len, _) = controller.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"jpeg");

        listener.abort();
    }
}
