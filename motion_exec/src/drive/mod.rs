//! # Drive module
//!
//! The single egress point of the motion pipeline toward the motors. A drive controller takes
//! the polar speed command produced by the chain and turns it into a per-motor command.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod differential;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use differential::*;
pub use params::*;

use crate::loc::Polar;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised when building a drive.
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Drive parameter {0} must be strictly positive, found {1}")]
    NonPositiveParam(&'static str, f64),
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A motor driven by a percentage of its nominal voltage.
pub trait Motor: Send {
    /// Set the motor speed.
    ///
    /// Units: percent of the nominal voltage, in `[-100, 100]`
    fn set_speed(&mut self, percent: f64);

    /// Actively hold the motor still.
    fn brake(&mut self);

    /// Let the motor spin freely.
    fn disable(&mut self);
}

/// Converts polar speed commands into motor commands.
pub trait DriveController: Send {
    /// Apply a speed command.
    ///
    /// Units: millimeters/period, degrees/period
    fn set_polar_velocity(&mut self, command: Polar);

    /// Brake every motor.
    fn stop(&mut self);

    /// Last command sent to the motors, left then right for differential drives.
    ///
    /// Units: percent
    fn motor_commands(&self) -> Vec<f64>;
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Motor command, in percent of the nominal voltage, per wheel revolution per second.
///
/// `60·gear_ratio / (Kv·V) · 100`, where `Kv` is in rpm/volt.
pub fn motor_constant(gear_ratio: f64, kv_rpm_per_volt: f64, nominal_voltage: f64) -> f64 {
    60.0 * gear_ratio / (kv_rpm_per_volt * nominal_voltage) * 100.0
}
