//! Differential drive controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;

use super::{DriveController, DriveError, DriveParams, Motor};
use crate::loc::Polar;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Two wheels on a common axle.
pub struct DifferentialDriveController<M: Motor> {
    params: DriveParams,
    left: M,
    right: M,
    last_commands: [f64; 2],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<M: Motor> DifferentialDriveController<M> {
    /// Build the drive, rejecting parameters which would turn commands into `inf` or `NaN`.
    pub fn new(params: DriveParams, left: M, right: M) -> Result<Self, DriveError> {
        params.validate()?;

        Ok(Self {
            params,
            left,
            right,
            last_commands: [0.0; 2],
        })
    }

    pub fn params(&self) -> &DriveParams {
        &self.params
    }

    pub fn motors(&self) -> (&M, &M) {
        (&self.left, &self.right)
    }

    /// Wheel speeds for a polar command.
    ///
    /// Units: millimeters/period
    pub fn wheel_speeds(&self, command: Polar) -> (f64, f64) {
        let rotation = command.angle.to_radians() * self.params.track_width_mm / 2.0;
        (command.distance - rotation, command.distance + rotation)
    }

    /// Motor command for a wheel speed, floored and clamped.
    ///
    /// Units: millimeters/period to percent
    pub fn wheel_command(&self, wheel_speed: f64) -> f64 {
        self.params.mm_per_period_to_percent(wheel_speed)
    }
}

impl<M: Motor> DriveController for DifferentialDriveController<M> {
    fn set_polar_velocity(&mut self, command: Polar) {
        let (left_speed, right_speed) = self.wheel_speeds(command);
        let left = self.wheel_command(left_speed);
        let right = self.wheel_command(right_speed);

        trace!("Drive command: left {:.2}%, right {:.2}%", left, right);

        self.left.set_speed(left);
        self.right.set_speed(right);
        self.last_commands = [left, right];
    }

    fn stop(&mut self) {
        self.left.brake();
        self.right.brake();
        self.last_commands = [0.0; 2];
    }

    fn motor_commands(&self) -> Vec<f64> {
        self.last_commands.to_vec()
    }
}
