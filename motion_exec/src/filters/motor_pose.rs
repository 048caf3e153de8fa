//! Position filter for a single motor axis
//!
//! Used by chains driving one actuator to a position (lifts, arms) rather than the platform.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::{
    ctrl::Controller,
    io::{ControllersIO, TargetPoseStatus},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotorPoseParams {
    /// Position error below which the target is reached
    pub threshold: f64,

    pub deceleration: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotorPoseKeys {
    pub current_pose: String,
    pub target_pose: String,
    pub current_speed: String,
    pub target_speed: String,

    pub position_error: String,
    pub filtered_speed: String,
    pub speed_filter_flag: String,
    pub pose_reached: String,
}

pub struct MotorPoseFilter {
    name: String,
    keys: MotorPoseKeys,
    params: MotorPoseParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for MotorPoseParams {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            deceleration: 1.0,
        }
    }
}

impl MotorPoseKeys {
    pub fn for_motor(motor: &str) -> Self {
        Self {
            current_pose: format!("{}_current_pose", motor),
            target_pose: format!("{}_target_pose", motor),
            current_speed: format!("{}_current_speed", motor),
            target_speed: format!("{}_target_speed", motor),
            position_error: format!("{}_pose_error", motor),
            filtered_speed: format!("{}_filtered_target_speed", motor),
            speed_filter_flag: format!("{}_speed_filter_flag", motor),
            pose_reached: format!("{}_pose_reached", motor),
        }
    }
}

impl Default for MotorPoseKeys {
    fn default() -> Self {
        Self::for_motor("motor")
    }
}

impl MotorPoseFilter {
    pub fn new(name: &str, keys: MotorPoseKeys, params: MotorPoseParams) -> Self {
        Self {
            name: name.to_string(),
            keys,
            params,
        }
    }
}

impl Controller for MotorPoseFilter {
    fn type_name(&self) -> &'static str {
        "MotorPoseFilter"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let k = &self.keys;

        let current_pose = io.get_or(&k.current_pose, 0.0f64);
        let target_pose = io.get_or(&k.target_pose, 0.0f64);
        let current_speed = io.get_or(&k.current_speed, 0.0f64);
        let mut target_speed = io.get_or(&k.target_speed, 0.0f64);
        let mut pose_reached = TargetPoseStatus::Moving;

        let position_error = target_pose - current_pose;
        let abs_error = position_error.abs();

        if abs_error <= self.params.threshold {
            pose_reached = TargetPoseStatus::Reached;
            target_speed = 0.0;
        }
        else if self.params.deceleration > 0.0 {
            let braking_distance = current_speed * current_speed / (2.0 * self.params.deceleration);
            if abs_error <= braking_distance {
                target_speed = (2.0 * self.params.deceleration * abs_error).sqrt();
            }
        }

        let k = &self.keys;
        io.write(&k.position_error, position_error);
        io.write(&k.filtered_speed, target_speed.abs());
        io.write(&k.speed_filter_flag, false);
        io.write(&k.pose_reached, pose_reached);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_motor_pose() {
        let mut f = MotorPoseFilter::new(
            "lift",
            MotorPoseKeys::for_motor("lift"),
            MotorPoseParams {
                threshold: 0.5,
                deceleration: 2.0,
            },
        );
        let mut io = ControllersIO::new();

        io.write("lift_current_pose", 0.0);
        io.write("lift_target_pose", 100.0);
        io.write("lift_current_speed", 10.0);
        io.write("lift_target_speed", -12.0);
        f.execute(&mut io);
        assert_eq!(io.get_as::<f64>("lift_pose_error"), Some(100.0));
        assert_eq!(io.get_as::<f64>("lift_filtered_target_speed"), Some(12.0));
        assert_eq!(io.get_as::<TargetPoseStatus>("lift_pose_reached"), Some(TargetPoseStatus::Moving));

        // Within the 25 units braking distance
        io.write("lift_current_pose", 84.0);
        f.execute(&mut io);
        assert_eq!(io.get_as::<f64>("lift_filtered_target_speed"), Some(8.0));

        io.write("lift_current_pose", 99.8);
        f.execute(&mut io);
        assert_eq!(io.get_as::<f64>("lift_filtered_target_speed"), Some(0.0));
        assert_eq!(io.get_as::<TargetPoseStatus>("lift_pose_reached"), Some(TargetPoseStatus::Reached));
    }
}
