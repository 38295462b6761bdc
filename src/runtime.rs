// Wires the control, streaming and discovery loops together
//
// Each loop runs as its own task. The control task owns the drive, so motor
// state is only ever touched from there; the stream channel is shared between
// its listener and whoever forwards frames.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info};

use crate::camera::{SimulatedFlash, TestPattern};
use crate::comm::{ControlService, DiscoveryResponder, StreamForwarder, UdpChannel};
use crate::config::Settings;
use crate::error::RoverError;
use crate::motor::{Drive, DriveConfig, SimulatedMotor};

/// Bound ports, available once startup succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ports {
    pub control: u16,
    pub stream: u16,
}

/// Everything bound and constructed, not yet running
pub struct Rover {
    control: ControlService<SimulatedMotor, SimulatedFlash>,
    forwarder: Arc<StreamForwarder>,
    discovery: Option<DiscoveryResponder>,
    test_pattern: Option<TestPattern>,
    ports: Ports,
}

impl Rover {
    pub async fn start(settings: &Settings) -> Result<Self, RoverError> {
        let drive_config = DriveConfig::from_settings(&settings.drive)?;
        let drive = Drive::new(
            &drive_config,
            SimulatedMotor::new("left"),
            SimulatedMotor::new("right"),
        );

        let control_channel = Arc::new(UdpChannel::bind("control", settings.control_port).await?);
        let stream_channel = Arc::new(UdpChannel::bind("stream", settings.stream_port).await?);

        let ports = Ports {
            control: control_channel.local_port(),
            stream: stream_channel.local_port(),
        };

        let discovery = settings
            .discovery
            .enabled
            .then(|| DiscoveryResponder::new(settings.discovery.clone(), ports.control, ports.stream));

        let test_pattern = (settings.camera.test_pattern_fps > 0).then(|| {
            TestPattern::new(
                settings.camera.test_pattern_fps,
                settings.camera.test_pattern_size,
            )
        });

        Ok(Self {
            control: ControlService::new(control_channel, drive, SimulatedFlash::default()),
            forwarder: Arc::new(StreamForwarder::new(stream_channel)),
            discovery,
            test_pattern,
            ports,
        })
    }

    pub fn ports(&self) -> Ports {
        self.ports
    }

    /// What discovery will answer with, `None` when discovery is disabled
    pub fn discovery_response(&self) -> Option<&[u8]> {
        self.discovery.as_ref().map(DiscoveryResponder::response)
    }

    /// Handle for an external capture loop to push frames through
    pub fn forwarder(&self) -> Arc<StreamForwarder> {
        self.forwarder.clone()
    }

    /// Spawn every loop; dropping the set aborts them and stops the motors
    pub fn spawn(self) -> JoinSet<()> {
        let mut tasks = JoinSet::new();

        tasks.spawn(self.control.run());
        tasks.spawn(self.forwarder.clone().listen());

        if let Some(discovery) = self.discovery {
            tasks.spawn(discovery.run());
        } else {
            info!("Discovery disabled");
        }

        if let Some(pattern) = self.test_pattern {
            tasks.spawn(pattern.run(self.forwarder));
        }

        tasks
    }
}

pub async fn run(settings: Settings) -> Result<(), RoverError> {
    info!("Starting rover runtime...");
    let rover = Rover::start(&settings).await?;
    let ports = rover.ports();

    info!(
        "Runtime started: control port {}, stream port {}",
        ports.control, ports.stream
    );

    let mut tasks = rover.spawn();

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        }
        Some(result) = tasks.join_next() => {
            // Loops never return on their own
            if let Err(e) = result {
                error!("Runtime task failed: {}", e);
            }
        }
    }

    tasks.shutdown().await;
    Ok(())
}
