//! # Simulated platform
//!
//! Motors and encoders of an ideal differential robot: each wheel moves during a period at the
//! speed its motor was commanded during the previous one. A wheel can be blocked to exercise the
//! stall detection.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex};
use log::error;

use crate::{
    drive::{DifferentialDriveController, DriveError, DriveParams, Motor},
    loc::{DifferentialLocalization, Encoder, LocParams, Pose},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// State of a simulated wheel.
#[derive(Debug, Default, Clone)]
pub struct SimWheel {
    /// Current motor command.
    ///
    /// Units: percent
    pub percent: f64,

    /// Blocked wheels don't move, whatever the command
    pub blocked: bool,

    /// Units: millimeters
    pub odometer_mm: f64,
}

/// Wheel shared by its motor and its encoder.
pub type SharedWheel = Arc<Mutex<SimWheel>>;

pub struct SimMotor {
    wheel: SharedWheel,
}

pub struct SimEncoder {
    wheel: SharedWheel,
    params: DriveParams,
}

/// A complete simulated robot, split into its drive and localisation halves.
pub struct SimPlatform {
    pub drive: DifferentialDriveController<SimMotor>,
    pub localization: DifferentialLocalization<SimEncoder>,
    pub left: SharedWheel,
    pub right: SharedWheel,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimMotor {
    pub fn new(wheel: SharedWheel) -> Self {
        Self { wheel }
    }

    fn set(&mut self, percent: f64) {
        match self.wheel.lock() {
            Ok(mut w) => w.percent = percent,
            Err(_) => error!("Simulated wheel lock poisoned"),
        }
    }
}

impl Motor for SimMotor {
    fn set_speed(&mut self, percent: f64) {
        self.set(percent);
    }

    fn brake(&mut self) {
        self.set(0.0);
    }

    fn disable(&mut self) {
        self.set(0.0);
    }
}

impl SimEncoder {
    pub fn new(wheel: SharedWheel, params: DriveParams) -> Self {
        Self { wheel, params }
    }
}

impl Encoder for SimEncoder {
    fn read_delta_mm(&mut self) -> f64 {
        match self.wheel.lock() {
            Ok(mut w) => {
                let delta = if w.blocked {
                    0.0
                }
                else {
                    self.params.percent_to_mm_per_period(w.percent)
                };
                w.odometer_mm += delta;
                delta
            }
            Err(_) => {
                error!("Simulated wheel lock poisoned");
                0.0
            }
        }
    }
}

impl SimPlatform {
    /// Build a robot at `initial_pose`. The odometry track width is the drive's.
    pub fn new(drive_params: DriveParams, initial_pose: Pose) -> Result<Self, DriveError> {
        let left: SharedWheel = Arc::new(Mutex::new(SimWheel::default()));
        let right: SharedWheel = Arc::new(Mutex::new(SimWheel::default()));

        let loc_params = LocParams {
            track_width_mm: drive_params.track_width_mm,
        };

        let drive = DifferentialDriveController::new(
            drive_params.clone(),
            SimMotor::new(left.clone()),
            SimMotor::new(right.clone()),
        )?;

        Ok(Self {
            localization: DifferentialLocalization::new(
                loc_params,
                SimEncoder::new(left.clone(), drive_params.clone()),
                SimEncoder::new(right.clone(), drive_params.clone()),
                initial_pose,
            ),
            drive,
            left,
            right,
        })
    }

    /// Block or release both wheels.
    pub fn set_blocked(&self, blocked: bool) {
        for w in [&self.left, &self.right].iter() {
            if let Ok(mut w) = w.lock() {
                w.blocked = blocked;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        drive::DriveController,
        loc::{Localization, Polar},
    };

    #[test]
    fn test_sim_platform() {
        let mut sim = SimPlatform::new(DriveParams::default(), Pose::default()).unwrap();

        sim.drive.set_polar_velocity(Polar::new(5.0, 0.0));
        sim.localization.update();
        sim.localization.update();
        assert!((sim.localization.pose().x - 10.0).abs() < 1e-9);
        assert!((sim.localization.delta_polar_pose().distance - 5.0).abs() < 1e-9);

        sim.drive.set_polar_velocity(Polar::new(0.0, 2.0));
        sim.localization.update();
        assert!((sim.localization.delta_polar_pose().angle - 2.0).abs() < 1e-9);

        sim.set_blocked(true);
        sim.localization.update();
        assert_eq!(sim.localization.delta_polar_pose(), Polar::new(0.0, 0.0));
        assert!((sim.left.lock().unwrap().odometer_mm - (10.0 - 2f64.to_radians() * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_zero_period() {
        let params = DriveParams {
            period_ms: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            SimPlatform::new(params, Pose::default()),
            Err(DriveError::NonPositiveParam("period_ms", _))
        ));
    }
}
