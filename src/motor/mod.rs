// Motor actuation for the rover's two drive motors
//
// Provides:
// - PWM timing and the eased speed-to-duty curve
// - The saturating two-motor drive engine
// - The per-motor hardware seam and a simulated implementation

mod curve;
mod drive;
mod sink;

pub use curve::{DriveConfig, SpeedCurve};
pub use drive::{Drive, Motor, Side};
pub use sink::{Direction, DutySink, SimulatedMotor};

/// Signed left/right values, either logical speeds or actuated duties
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorSpeeds {
    pub left: i32,
    pub right: i32,
}

impl MotorSpeeds {
    pub fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }
}
