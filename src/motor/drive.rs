// Two-motor differential drive
//
// Every motion command funnels through `change_speed`, which saturates the
// logical speed, maps it through the eased curve plus deadzone and only touches
// hardware when the speed actually changes.

use tracing::{debug, info};

use super::curve::{DriveConfig, SpeedCurve};
use super::sink::{Direction, DutySink};
use super::MotorSpeeds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// One motor's logical state and the sink it drives
#[derive(Debug)]
pub struct Motor<S> {
    side: Side,
    speed: i32,
    duty: u32,
    direction: Direction,
    sink: S,
}

impl<S: DutySink> Motor<S> {
    fn new(side: Side, mut sink: S) -> Self {
        // Same bring-up order as the bridge expects: idle duty, then direction
        sink.set_duty(0);
        sink.forward();

        Self {
            side,
            speed: 0,
            duty: 0,
            direction: Direction::Forward,
            sink,
        }
    }

    fn change_speed(&mut self, delta: i32, curve: &SpeedCurve, deadzone: u32) -> i32 {
        let limit = curve.limit() as i64;
        let old = self.speed;
        let new = (old as i64 + delta as i64).clamp(-limit, limit) as i32;

        if new == old {
            return self.signed_duty();
        }

        let duty = if new == 0 {
            0
        } else {
            curve
                .duty(new.unsigned_abs())
                .saturating_add(deadzone)
                .min(curve.limit())
        };

        if old >= 0 && new < 0 {
            self.sink.reverse();
            self.direction = Direction::Reverse;
        } else if old < 0 && new >= 0 {
            self.sink.forward();
            self.direction = Direction::Forward;
        }

        self.sink.set_duty(duty);
        self.speed = new;
        self.duty = duty;

        debug!(
            "{:?} motor: speed {} -> {}, duty {}",
            self.side, old, new, duty
        );

        self.signed_duty()
    }

    fn signed_duty(&self) -> i32 {
        if self.speed < 0 {
            -(self.duty as i32)
        } else {
            self.duty as i32
        }
    }

    pub fn speed(&self) -> i32 {
        self.speed
    }

    /// Last duty written to the hardware
    pub fn duty(&self) -> u32 {
        self.duty
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Motor actuation engine for the left/right pair
#[derive(Debug)]
pub struct Drive<S: DutySink> {
    left: Motor<S>,
    right: Motor<S>,
    curve: SpeedCurve,
    deadzone: u32,
}

impl<S: DutySink> Drive<S> {
    pub fn new(config: &DriveConfig, left: S, right: S) -> Self {
        info!(
            "Drive: {} Hz PWM at {} Hz resolution, duty tick max {}, deadzone {}",
            config.pwm_freq_hz,
            config.timer_resolution_hz,
            config.duty_tick_max(),
            config.deadzone()
        );

        Self {
            left: Motor::new(Side::Left, left),
            right: Motor::new(Side::Right, right),
            curve: SpeedCurve::ease_out(config.duty_tick_max()),
            deadzone: config.deadzone(),
        }
    }

    /// Apply a saturating speed delta to one motor, returning its signed duty
    pub fn change_speed(&mut self, side: Side, delta: i32) -> i32 {
        let motor = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        };
        motor.change_speed(delta, &self.curve, self.deadzone)
    }

    /// Independent deltas for both motors
    pub fn change_speeds(&mut self, left: i32, right: i32) -> MotorSpeeds {
        MotorSpeeds::new(
            self.change_speed(Side::Left, left),
            self.change_speed(Side::Right, right),
        )
    }

    /// Bring both motors to a full stop
    pub fn stop(&mut self) -> MotorSpeeds {
        let left = self.left.speed;
        let right = self.right.speed;
        self.change_speeds(-left, -right)
    }

    /// Same delta on both motors
    pub fn bump(&mut self, inc: i32) -> MotorSpeeds {
        self.change_speeds(inc, inc)
    }

    pub fn turn(&mut self, inc_left: i32, inc_right: i32) -> MotorSpeeds {
        self.change_speeds(inc_left, inc_right)
    }

    /// Drive towards absolute speeds; targets beyond the tick range saturate
    pub fn set_absolute(&mut self, left: i32, right: i32) -> MotorSpeeds {
        let inc_left = left.saturating_sub(self.left.speed);
        let inc_right = right.saturating_sub(self.right.speed);
        self.change_speeds(inc_left, inc_right)
    }

    /// Takes effect on the next speed change, nothing is re-actuated now
    pub fn set_deadzone(&mut self, deadzone: u32) {
        info!("Drive deadzone: {} -> {}", self.deadzone, deadzone);
        self.deadzone = deadzone;
    }

    pub fn deadzone(&self) -> u32 {
        self.deadzone
    }

    pub fn duty_tick_max(&self) -> u32 {
        self.curve.limit()
    }

    /// Logical speeds
    pub fn speeds(&self) -> MotorSpeeds {
        MotorSpeeds::new(self.left.speed, self.right.speed)
    }

    /// Signed duties last written to the hardware
    pub fn actuated(&self) -> MotorSpeeds {
        MotorSpeeds::new(self.left.signed_duty(), self.right.signed_duty())
    }

    pub fn motor(&self, side: Side) -> &Motor<S> {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

impl<S: DutySink> Drop for Drive<S> {
    fn drop(&mut self) {
        // Never leave the motors running once nothing can command them
        if self.left.speed != 0 || self.right.speed != 0 {
            info!("Stopping motors on drive shutdown");
            self.stop();
        }
    }
}
