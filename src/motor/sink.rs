// Hardware seam for one brushed DC motor behind an H-bridge
//
// The drive engine never fails: out-of-range requests are saturated before they
// reach a sink, so sink calls are infallible. Hardware implementations report
// their own faults through tracing.

use tracing::debug;

/// Direction the H-bridge is currently driving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

/// PWM duty output and direction control for a single motor
pub trait DutySink: Send {
    /// Write a duty in ticks, `0..=duty_tick_max`
    fn set_duty(&mut self, duty: u32);

    fn forward(&mut self);

    fn reverse(&mut self);
}

/// Sink used when no motor hardware is attached: remembers and logs the output
#[derive(Debug, Clone, Default)]
pub struct SimulatedMotor {
    name: &'static str,
    duty: u32,
    direction: Direction,
}

impl SimulatedMotor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    pub fn duty(&self) -> u32 {
        self.duty
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl DutySink for SimulatedMotor {
    fn set_duty(&mut self, duty: u32) {
        debug!("{} motor: duty={} ({:?})", self.name, duty, self.direction);
        self.duty = duty;
    }

    fn forward(&mut self) {
        debug!("{} motor: forward", self.name);
        self.direction = Direction::Forward;
    }

    fn reverse(&mut self) {
        debug!("{} motor: reverse", self.name);
        self.direction = Direction::Reverse;
    }
}
