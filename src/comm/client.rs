// Last-known controller address, one slot per socket
//
// The receive loop owning a socket is the only writer; senders on other tasks
// read it. Addresses compare logically (family, IP, port), never byte-wise.

use std::net::SocketAddr;
use std::sync::RwLock;

use tracing::info;

#[derive(Debug, Default)]
pub struct ClientAddress {
    slot: RwLock<Option<SocketAddr>>,
}

impl ClientAddress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the sender of a datagram, returning true when the slot changed
    pub fn observe(&self, addr: SocketAddr) -> bool {
        if self.get() == Some(addr) {
            return false;
        }

        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        let previous = slot.replace(addr);
        drop(slot);

        match previous {
            Some(previous) => info!("Client address updated: {} -> {}", previous, addr),
            None => info!("Client address set: {}", addr),
        }
        true
    }

    pub fn get(&self) -> Option<SocketAddr> {
        *self.slot.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};
    use std::sync::Arc;

    #[test]
    fn test_starts_empty() {
        assert_eq!(ClientAddress::new().get(), None);
    }

    #[test]
    fn test_last_writer_wins() {
        let client = ClientAddress::new();
        let a: SocketAddr = "192.168.4.2:5000".parse().unwrap();
        let b: SocketAddr = "192.168.4.3:5000".parse().unwrap();

        assert!(client.observe(a));
        assert!(!client.observe(a));
        assert!(client.observe(b));
        assert_eq!(client.get(), Some(b));
    }

    #[test]
    fn test_port_change_is_a_new_client() {
        let client = ClientAddress::new();
        assert!(client.observe("10.0.0.1:4000".parse().unwrap()));
        assert!(client.observe("10.0.0.1:4001".parse().unwrap()));
    }

    #[test]
    fn test_family_is_part_of_identity() {
        let client = ClientAddress::new();
        let v4 = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 7000));
        let v6 = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 7000, 0, 0));

        assert!(client.observe(v4));
        assert!(client.observe(v6));
        assert!(matches!(client.get(), Some(SocketAddr::V6(_))));
    }

    #[test]
    fn test_concurrent_readers_see_whole_addresses() {
        let client = Arc::new(ClientAddress::new());
        let candidates: Vec<SocketAddr> = (0..4)
            .map(|i| format!("10.0.{}.{}:{}", i, i, 6000 + i).parse().unwrap())
            .collect();

        let writer = {
            let client = client.clone();
            let candidates = candidates.clone();
            std::thread::spawn(move || {
                for i in 0..2_000 {
                    client.observe(candidates[i % candidates.len()]);
                }
            })
        };

        for _ in 0..2_000 {
            if let Some(addr) = client.get() {
                assert!(candidates.contains(&addr));
            }
        }
        writer.join().unwrap();
    }
}
