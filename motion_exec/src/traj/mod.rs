//! # Trajectory generation
//!
//! Trapezoidal velocity profiles and the controllers which follow them. A profile is generated
//! when a filter upstream raises the axis' recompute flag, then sampled once per period to give
//! a velocity to feed forward and the distance the robot should still have to travel. The
//! difference between that theoretical distance and the measured pose error is the tracking
//! error, which a pose PID turns into a correction.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod feedforward;
mod profile;
mod tracker;

pub use feedforward::*;
pub use profile::*;
pub use tracker::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Kinematic limits of a profile, per axis.
///
/// Units are per period: mm/period and mm/period² on the linear axis, deg/period and
/// deg/period² on the angular one.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfileParams {
    pub max_speed: f64,
    pub acceleration: f64,
    pub deceleration: f64,

    /// End the profile at rest rather than at full speed
    pub must_stop_at_end: bool,

    /// Number of profile periods elapsed per execution, for throttled trackers
    pub period_increment: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ProfileParams {
    fn default() -> Self {
        Self {
            max_speed: 10.0,
            acceleration: 1.0,
            deceleration: 1.0,
            must_stop_at_end: true,
            period_increment: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Sample a running profile: (velocity to follow, tracking error).
fn follow(profile: &TrapezoidalProfile, period: u32, pose_error: f64) -> (f64, f64) {
    let velocity = profile.velocity(period);
    let tracking_error = pose_error - profile.remaining_distance(period);
    (velocity, tracking_error)
}
