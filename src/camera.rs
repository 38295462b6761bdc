// Camera-side collaborators: the flash LED and a stand-in frame source
//
// Real capture hardware lives outside this crate. It hands each frame to
// `StreamForwarder::forward`; `TestPattern` does the same on a host so the
// streaming path can be exercised without a sensor.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::comm::StreamForwarder;

/// Flash LED driven by an 8-bit PWM channel
pub trait FlashLight: Send {
    fn set_duty(&mut self, duty: u8);
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedFlash {
    duty: u8,
}

impl SimulatedFlash {
    pub fn duty(&self) -> u8 {
        self.duty
    }
}

impl FlashLight for SimulatedFlash {
    fn set_duty(&mut self, duty: u8) {
        debug!("Flash duty: {}", duty);
        self.duty = duty;
    }
}

/// Synthetic JPEG-framed test pattern at a fixed rate
#[derive(Debug, Clone)]
pub struct TestPattern {
    fps: u32,
    size: usize,
    sequence: u32,
}

impl TestPattern {
    // SOI + 4-byte sequence number + EOI
    const MIN_SIZE: usize = 8;

    pub fn new(fps: u32, size: usize) -> Self {
        Self {
            fps: fps.max(1),
            size: size.max(Self::MIN_SIZE),
            sequence: 0,
        }
    }

    /// Next frame: JPEG start/end markers around a sequence number and filler
    pub fn next_frame(&mut self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.size);
        frame.extend_from_slice(&[0xFF, 0xD8]);
        frame.extend_from_slice(&self.sequence.to_le_bytes());
        frame.resize(self.size - 2, (self.sequence & 0xFF) as u8);
        frame.extend_from_slice(&[0xFF, 0xD9]);

        self.sequence = self.sequence.wrapping_add(1);
        frame
    }

    pub async fn run(mut self, forwarder: Arc<StreamForwarder>) {
        info!(
            "Test pattern camera: {} fps, {} byte frames",
            self.fps, self.size
        );

        let mut tick = interval(Duration::from_secs(1) / self.fps);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick.tick().await;
            let frame = self.next_frame();
            forwarder.forward(&frame).await;
        }
    }
}
