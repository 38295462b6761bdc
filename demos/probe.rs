// Minimal controller: discover a rover, nudge the motors, stop, print acks
//
// Usage: cargo run --example probe -- [rover-ip:control-port]
// Without an address the rover is located with a multicast probe.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use cam_rover_runtime::config::{DISCOVERY_GROUP, DISCOVERY_PORT, PROBE, PROBE_MATCH_PREFIX};
use cam_rover_runtime::motor::MotorSpeeds;
use cam_rover_runtime::protocol::{decode, Command};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{info, warn};

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let control = match std::env::args().nth(1) {
        Some(addr) => addr.parse()?,
        None => discover().await?,
    };
    info!("Rover control endpoint: {}", control);

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    let commands = [
        Command::SpeedUp(10),
        Command::SpeedUp(10),
        Command::TurnLeft(5),
        Command::Set(MotorSpeeds::new(40, -40)),
        Command::Flash(16),
        Command::Stop,
    ];

    for (id, command) in (1u32..).zip(commands) {
        socket.send_to(&command.encode(id), control).await?;

        let mut buf = [0u8; 64];
        match timeout(REPLY_TIMEOUT, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => match decode(&buf[..len]).map(|m| (m.id, m.command())) {
                Ok((ack_id, Ok(Command::Ack(Some(speeds))))) => {
                    info!(
                        "{:?} -> ack {} left={} right={}",
                        command, ack_id, speeds.left, speeds.right
                    );
                }
                other => warn!("{:?} -> unexpected reply {:?}", command, other),
            },
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => warn!("{:?} -> no reply", command),
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    Ok(())
}

/// Multicast a probe and parse `CAM-ROVER:PROBE_MATCH:<control>:<stream>`
async fn discover() -> Result<SocketAddr, Box<dyn std::error::Error + Send + Sync>> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    let group = SocketAddr::from((DISCOVERY_GROUP, DISCOVERY_PORT));

    loop {
        info!("Probing {}...", group);
        socket.send_to(PROBE, group).await?;

        let mut buf = [0u8; 64];
        let Ok(received) = timeout(REPLY_TIMEOUT, socket.recv_from(&mut buf)).await else {
            continue;
        };
        let (len, from) = received?;

        let response = String::from_utf8_lossy(&buf[..len]);
        let Some(ports) = response
            .strip_prefix(PROBE_MATCH_PREFIX)
            .and_then(|rest| rest.strip_prefix(':'))
        else {
            continue;
        };

        let mut tokens = ports.split(':');
        if let (Some(control), Some(stream)) = (tokens.next(), tokens.next()) {
            info!("Found rover at {} (control {}, stream {})", from.ip(), control, stream);
            return Ok(SocketAddr::new(from.ip(), control.parse()?));
        }
    }
}
