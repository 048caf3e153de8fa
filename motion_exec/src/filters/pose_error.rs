//! Single axis pose error

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::{ctrl::Controller, io::ControllersIO, loc::Pose};
use util::maths::limit_angle_deg;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoseErrorKeys {
    pub current_pose_x: String,
    pub current_pose_y: String,
    pub current_pose_o: String,
    pub target_pose_x: String,
    pub target_pose_y: String,
    pub target_pose_o: String,
    pub pose_error: String,
}

/// Computes the error of one axis between the current and target poses.
///
/// In linear mode the error is the distance to the target, negative when the target is behind
/// the robot. In angular mode it is the heading error.
pub struct PoseErrorFilter {
    name: String,
    keys: PoseErrorKeys,
    mode: PoseErrorMode,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PoseErrorMode {
    Linear,
    Angular,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PoseErrorKeys {
    pub fn for_axis(axis: &str) -> Self {
        Self {
            current_pose_x: "current_pose_x".to_string(),
            current_pose_y: "current_pose_y".to_string(),
            current_pose_o: "current_pose_O".to_string(),
            target_pose_x: "target_pose_x".to_string(),
            target_pose_y: "target_pose_y".to_string(),
            target_pose_o: "target_pose_O".to_string(),
            pose_error: format!("{}_pose_error", axis),
        }
    }
}

impl Default for PoseErrorKeys {
    fn default() -> Self {
        Self::for_axis("linear")
    }
}

impl PoseErrorFilter {
    pub fn new(name: &str, keys: PoseErrorKeys, mode: PoseErrorMode) -> Self {
        Self {
            name: name.to_string(),
            keys,
            mode,
        }
    }

    pub fn mode(&self) -> PoseErrorMode {
        self.mode
    }

    /// Error from `current` to `target` in this filter's mode.
    pub fn error(&self, current: &Pose, target: &Pose) -> f64 {
        match self.mode {
            PoseErrorMode::Linear => {
                let polar = current.polar_error_to(target);
                if polar.angle.abs() > 90.0 {
                    -polar.distance
                }
                else {
                    polar.distance
                }
            }
            PoseErrorMode::Angular => limit_angle_deg(target.o - current.o),
        }
    }
}

impl Controller for PoseErrorFilter {
    fn type_name(&self) -> &'static str {
        "PoseErrorFilter"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let k = &self.keys;
        let current = Pose::new(
            io.get_or(&k.current_pose_x, 0.0f64),
            io.get_or(&k.current_pose_y, 0.0f64),
            io.get_or(&k.current_pose_o, 0.0f64),
        );
        let target = Pose::new(
            io.get_or(&k.target_pose_x, 0.0f64),
            io.get_or(&k.target_pose_y, 0.0f64),
            io.get_or(&k.target_pose_o, 0.0f64),
        );

        let error = self.error(&current, &target);
        io.write(&self.keys.pose_error, error);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_linear() {
        let f = PoseErrorFilter::new("", PoseErrorKeys::default(), PoseErrorMode::Linear);

        let current = Pose::new(0.0, 0.0, 90.0);
        assert!((f.error(&current, &Pose::new(0.0, 50.0, 0.0)) - 50.0).abs() < 1e-9);
        assert!((f.error(&current, &Pose::new(30.0, -40.0, 0.0)) + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_angular() {
        let mut f = PoseErrorFilter::new("", PoseErrorKeys::for_axis("angular"), PoseErrorMode::Angular);
        let mut io = ControllersIO::new();

        io.write("current_pose_O", 170.0);
        io.write("target_pose_O", -170.0);
        f.execute(&mut io);
        assert!((io.get_as::<f64>("angular_pose_error").unwrap() - 20.0).abs() < 1e-9);
    }
}
