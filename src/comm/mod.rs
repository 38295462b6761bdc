// UDP transport for the rover
//
// Provides:
// - The control service (commands in, acknowledgements out)
// - The multicast discovery responder
// - The camera stream forwarder
// - Shared plumbing: bound channels, client address slot, restart backoff

mod backoff;
mod channel;
mod client;
mod control;
mod discovery;
mod stream;

pub use backoff::Backoff;
pub use channel::{SendOutcome, UdpChannel};
pub use client::ClientAddress;
pub use control::ControlService;
pub use discovery::{probe_match, DiscoveryResponder};
pub use stream::StreamForwarder;
