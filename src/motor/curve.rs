// PWM timing and the eased speed-to-duty curve
//
// Speeds are expressed in duty ticks: one tick is one unit of PWM resolution and
// `duty_tick_max` ticks is 100% duty. The curve maps a commanded speed magnitude
// to a duty with a quadratic ease-out so low speeds ramp up quickly.

use crate::config::{DriveSettings, MAX_DUTY_TICKS};
use crate::error::ConfigError;

/// Timer resolution, PWM frequency and everything derived from them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveConfig {
    pub timer_resolution_hz: u32,
    pub pwm_freq_hz: u32,
    duty_tick_max: u32,
    deadzone: u32,
}

impl DriveConfig {
    pub fn new(timer_resolution_hz: u32, pwm_freq_hz: u32) -> Result<Self, ConfigError> {
        if pwm_freq_hz == 0 {
            return Err(ConfigError::InvalidDrive {
                reason: "PWM frequency must be non-zero".to_string(),
            });
        }

        let duty_tick_max = timer_resolution_hz / pwm_freq_hz;
        if duty_tick_max == 0 {
            return Err(ConfigError::InvalidDrive {
                reason: format!(
                    "PWM frequency {} Hz exceeds timer resolution {} Hz",
                    pwm_freq_hz, timer_resolution_hz
                ),
            });
        }

        // The curve holds one entry per tick
        if duty_tick_max > MAX_DUTY_TICKS {
            return Err(ConfigError::InvalidDrive {
                reason: format!(
                    "duty tick max {} exceeds {} ({} Hz / {} Hz)",
                    duty_tick_max, MAX_DUTY_TICKS, timer_resolution_hz, pwm_freq_hz
                ),
            });
        }

        Ok(Self {
            timer_resolution_hz,
            pwm_freq_hz,
            duty_tick_max,
            deadzone: duty_tick_max / 3,
        })
    }

    pub fn from_settings(settings: &DriveSettings) -> Result<Self, ConfigError> {
        let config = Self::new(settings.timer_resolution_hz, settings.pwm_freq_hz)?;
        Ok(match settings.deadzone {
            Some(deadzone) => config.with_deadzone(deadzone),
            None => config,
        })
    }

    pub fn with_deadzone(mut self, deadzone: u32) -> Self {
        self.deadzone = deadzone;
        self
    }

    pub fn duty_tick_max(&self) -> u32 {
        self.duty_tick_max
    }

    /// Initial deadzone handed to the drive
    pub fn deadzone(&self) -> u32 {
        self.deadzone
    }
}

/// Precomputed `duty_tick_max + 1` entries, indexed by speed magnitude
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedCurve {
    ticks: Vec<u32>,
}

impl SpeedCurve {
    /// `curve[i] = limit - (limit - i)^2 / limit`
    pub fn ease_out(limit: u32) -> Self {
        let limit = limit as u64;
        let ticks = (0..=limit)
            .map(|i| {
                let rest = limit - i;
                (limit - rest * rest / limit.max(1)) as u32
            })
            .collect();

        Self { ticks }
    }

    /// Eased duty for a speed magnitude, clamped to the last entry
    pub fn duty(&self, magnitude: u32) -> u32 {
        let index = (magnitude as usize).min(self.ticks.len() - 1);
        self.ticks[index]
    }

    pub fn limit(&self) -> u32 {
        (self.ticks.len() - 1) as u32
    }

    pub fn ticks(&self) -> &[u32] {
        &self.ticks
    }
}
