use std::path::PathBuf;

use clap::Parser;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use cam_rover_runtime::config::Settings;
use cam_rover_runtime::error::RoverError;

/// Camera rover control runtime
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// UDP port for commands (0 = ephemeral)
    #[arg(long)]
    control_port: Option<u16>,

    /// UDP port for camera frames (0 = ephemeral)
    #[arg(long)]
    stream_port: Option<u16>,

    /// Minimum duty added to any non-zero speed
    #[arg(long)]
    deadzone: Option<u32>,

    /// Stream a synthetic test pattern at this frame rate
    #[arg(long)]
    test_pattern_fps: Option<u32>,

    /// Do not answer multicast discovery probes
    #[arg(long)]
    no_discovery: bool,
}

impl Args {
    fn settings(&self) -> Result<Settings, RoverError> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        if let Some(port) = self.control_port {
            settings.control_port = port;
        }
        if let Some(port) = self.stream_port {
            settings.stream_port = port;
        }
        if let Some(deadzone) = self.deadzone {
            settings.drive.deadzone = Some(deadzone);
        }
        if let Some(fps) = self.test_pattern_fps {
            settings.camera.test_pattern_fps = fps;
        }
        if self.no_discovery {
            settings.discovery.enabled = false;
        }

        Ok(settings)
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (RUST_LOG overrides the info default)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();

    let result = match args.settings() {
        Ok(settings) => cam_rover_runtime::runtime::run(settings).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
