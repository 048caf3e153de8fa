//! # Localisation module
//!
//! Provides the robot with an idea of where it is on the table, and how far it moved during the
//! last control period. Odometry integrates two wheel encoders over the track width.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use log::trace;

use util::maths::limit_angle_deg;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Position and heading of the robot on the table.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Units: millimeters
    pub x: f64,

    /// Units: millimeters
    pub y: f64,

    /// Heading.
    ///
    /// Units: degrees
    #[serde(rename = "O")]
    pub o: f64
}

/// A linear/angular pair, used for speeds, speed errors and pose errors.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polar {
    /// Linear component.
    ///
    /// Units: millimeters (per period for speeds)
    pub distance: f64,

    /// Angular component.
    ///
    /// Units: degrees (per period for speeds)
    pub angle: f64
}

/// Parameters of the differential odometry.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LocParams {
    /// Distance between the two encoder wheels.
    ///
    /// Units: millimeters
    pub track_width_mm: f64
}

/// Odometry of a differential drive robot.
pub struct DifferentialLocalization<E: Encoder> {
    params: LocParams,
    left: E,
    right: E,
    pose: Pose,
    delta: Polar
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Source of the robot pose, sampled once per control period.
pub trait Localization: Send {
    /// Integrate the motion since the last update.
    fn update(&mut self);

    /// Current pose.
    fn pose(&self) -> Pose;

    /// Motion during the last period, i.e. the current polar speed.
    fn delta_polar_pose(&self) -> Polar;

    /// Overwrite the current pose (e.g. on a recalibration against a border).
    fn set_pose(&mut self, pose: Pose);
}

/// A wheel encoder.
pub trait Encoder: Send {
    /// Distance travelled by the wheel since the previous read.
    ///
    /// Units: millimeters
    fn read_delta_mm(&mut self) -> f64;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(x: f64, y: f64, o: f64) -> Self {
        Self { x, y, o }
    }

    pub fn coords(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    /// Polar error to reach `target` from this pose.
    ///
    /// The distance is the euclidian distance between the two positions, the angle is the
    /// bearing of the target relative to the current heading, in `(-180, 180]`.
    pub fn polar_error_to(&self, target: &Pose) -> Polar {
        let dx = target.x - self.x;
        let dy = target.y - self.y;

        Polar {
            distance: dx.hypot(dy),
            angle: limit_angle_deg(dy.atan2(dx).to_degrees() - self.o)
        }
    }
}

impl Polar {
    pub fn new(distance: f64, angle: f64) -> Self {
        Self { distance, angle }
    }

    /// Mirror the error so the robot backs up instead of turning around.
    pub fn reverse(&mut self) {
        self.distance = -self.distance;
        self.angle = if self.angle < 0.0 {
            self.angle + 180.0
        }
        else {
            self.angle - 180.0
        };
    }
}

impl<E: Encoder> DifferentialLocalization<E> {
    pub fn new(params: LocParams, left: E, right: E, initial_pose: Pose) -> Self {
        Self {
            params,
            left,
            right,
            pose: initial_pose,
            delta: Polar::default()
        }
    }
}

impl<E: Encoder> Localization for DifferentialLocalization<E> {
    fn update(&mut self) {
        let left_mm = self.left.read_delta_mm();
        let right_mm = self.right.read_delta_mm();

        let linear = (left_mm + right_mm) / 2.0;
        let angular_rad = (right_mm - left_mm) / self.params.track_width_mm;

        self.pose.o = limit_angle_deg(self.pose.o + angular_rad.to_degrees());

        let o_rad = self.pose.o.to_radians();
        self.pose.x += linear * o_rad.cos();
        self.pose.y += linear * o_rad.sin();

        self.delta = Polar::new(linear, angular_rad.to_degrees());

        trace!("Localization update: {:?}, delta {:?}", self.pose, self.delta);
    }

    fn pose(&self) -> Pose {
        self.pose
    }

    fn delta_polar_pose(&self) -> Polar {
        self.delta
    }

    fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct FixedEncoder(f64);

    impl Encoder for FixedEncoder {
        fn read_delta_mm(&mut self) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_polar_error() {
        let current = Pose::new(0.0, 0.0, 90.0);

        let err = current.polar_error_to(&Pose::new(100.0, 0.0, 0.0));
        assert!((err.distance - 100.0).abs() < 1e-9);
        assert!((err.angle + 90.0).abs() < 1e-9);

        let mut err = current.polar_error_to(&Pose::new(0.0, -50.0, 0.0));
        assert!((err.angle - 180.0).abs() < 1e-9);
        err.reverse();
        assert!((err.distance + 50.0).abs() < 1e-9);
        assert!(err.angle.abs() < 1e-9);
    }

    #[test]
    fn test_differential_odometry() {
        let params = LocParams { track_width_mm: 200.0 };

        // Straight line
        let mut loc = DifferentialLocalization::new(
            params, FixedEncoder(10.0), FixedEncoder(10.0), Pose::default());
        loc.update();
        loc.update();
        assert!((loc.pose().x - 20.0).abs() < 1e-9);
        assert_eq!(loc.delta_polar_pose(), Polar::new(10.0, 0.0));

        // Rotation on the spot
        let mut loc = DifferentialLocalization::new(
            params, FixedEncoder(-1.0), FixedEncoder(1.0), Pose::default());
        loc.update();
        let expected_deg = (2.0f64 / 200.0).to_degrees();
        assert!((loc.pose().o - expected_deg).abs() < 1e-9);
        assert!(loc.pose().x.abs() < 1e-9);
        assert!((loc.delta_polar_pose().angle - expected_deg).abs() < 1e-9);
    }
}
