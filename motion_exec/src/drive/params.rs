//! Parameters of the drive controllers

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use std::f64::consts::PI;

use super::DriveError;
use util::maths::{clamp, sign};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of a differential drive.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriveParams {

    // ---- GEOMETRY ----

    /// Units: millimeters
    pub wheel_diameter_mm: f64,

    /// Distance between the two drive wheels.
    ///
    /// Units: millimeters
    pub track_width_mm: f64,

    // ---- MOTORS ----

    /// Motor revolutions per wheel revolution
    pub gear_ratio: f64,

    /// Units: rpm/volt
    pub motor_kv: f64,

    /// Units: volts
    pub nominal_voltage: f64,

    // ---- LIMITS ----

    /// Non null commands are raised to at least this magnitude, to overcome static friction.
    ///
    /// Units: percent
    pub min_speed_percent: f64,

    /// Units: percent
    pub max_speed_percent: f64,

    /// Control period the commands are expressed in.
    ///
    /// Units: milliseconds
    pub period_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for DriveParams {
    fn default() -> Self {
        Self {
            wheel_diameter_mm: 60.0,
            track_width_mm: 200.0,
            gear_ratio: 1.0,
            motor_kv: 50.0,
            nominal_voltage: 12.0,
            min_speed_percent: 0.0,
            max_speed_percent: 100.0,
            period_ms: 20.0,
        }
    }
}

impl DriveParams {
    /// Check every divisor of the command conversions is strictly positive.
    pub fn validate(&self) -> Result<(), DriveError> {
        let positive = [
            ("wheel_diameter_mm", self.wheel_diameter_mm),
            ("track_width_mm", self.track_width_mm),
            ("gear_ratio", self.gear_ratio),
            ("motor_kv", self.motor_kv),
            ("nominal_voltage", self.nominal_voltage),
            ("period_ms", self.period_ms),
        ];

        for &(name, value) in positive.iter() {
            // Also catches NaN
            if !(value > 0.0) {
                return Err(DriveError::NonPositiveParam(name, value));
            }
        }

        Ok(())
    }

    pub fn motor_constant(&self) -> f64 {
        super::motor_constant(self.gear_ratio, self.motor_kv, self.nominal_voltage)
    }

    /// Wheel speed corresponding to a motor command.
    ///
    /// Units: percent to millimeters/period
    pub fn percent_to_mm_per_period(&self, percent: f64) -> f64 {
        let revs_per_s = percent / self.motor_constant();
        revs_per_s * PI * self.wheel_diameter_mm * self.period_ms / 1000.0
    }

    /// Motor command for a wheel speed, floored to the minimum and clamped to the maximum command.
    ///
    /// Units: millimeters/period to percent
    pub fn mm_per_period_to_percent(&self, speed: f64) -> f64 {
        let mm_per_s = speed * 1000.0 / self.period_ms;
        let revs_per_s = mm_per_s / (PI * self.wheel_diameter_mm);
        let mut percent = revs_per_s * self.motor_constant();

        if percent != 0.0 && percent.abs() < self.min_speed_percent {
            percent = sign(percent) * self.min_speed_percent;
        }

        clamp(percent, -self.max_speed_percent, self.max_speed_percent)
    }
}
