//! Combined speed filter of the historical chains
//!
//! Caps the speed order to the target speed, limits its acceleration and raises it to the
//! minimum speed, then optionally runs its own stall detection. Newer chains split these steps
//! into `SpeedLimitFilter`, `AccelerationFilter` and `AntiBlockingController`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, warn};
use serde::Deserialize;

use crate::{
    ctrl::Controller,
    io::{ControllersIO, TargetPoseStatus},
};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeedFilterParams {
    pub min_speed: f64,
    pub max_speed: f64,

    /// Maximum change of the speed order per period
    pub max_acceleration: f64,

    pub anti_blocking: bool,

    /// Below this speed the robot may be stalled
    pub anti_blocking_speed_threshold: f64,

    /// Above this speed error the robot may be stalled
    pub anti_blocking_error_threshold: f64,

    /// Consecutive stalled periods before the target is declared blocked
    pub anti_blocking_blocked_cycles_nb_threshold: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeedFilterKeys {
    /// Speed order, filtered in place
    pub speed_order: String,
    pub current_speed: String,
    pub target_speed: String,

    /// When true the order goes through unfiltered
    pub speed_filter_flag: String,

    pub speed_error: String,

    /// Only written, with `Blocked`, when the legacy stall detection trips
    pub pose_reached: String,
}

pub struct SpeedFilter {
    name: String,
    keys: SpeedFilterKeys,
    params: SpeedFilterParams,
    blocked_cycles: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SpeedFilterParams {
    fn default() -> Self {
        Self {
            min_speed: 0.0,
            max_speed: 10.0,
            max_acceleration: 1.0,
            anti_blocking: false,
            anti_blocking_speed_threshold: 0.1,
            anti_blocking_error_threshold: 1.0,
            anti_blocking_blocked_cycles_nb_threshold: 10,
        }
    }
}

impl SpeedFilterKeys {
    pub fn for_axis(axis: &str) -> Self {
        Self {
            speed_order: format!("{}_speed_order", axis),
            current_speed: format!("{}_current_speed", axis),
            target_speed: format!("{}_target_speed", axis),
            speed_filter_flag: format!("{}_speed_filter_flag", axis),
            speed_error: format!("{}_speed_error", axis),
            pose_reached: "pose_reached".to_string(),
        }
    }
}

impl Default for SpeedFilterKeys {
    fn default() -> Self {
        Self::for_axis("linear")
    }
}

impl SpeedFilter {
    pub fn new(name: &str, keys: SpeedFilterKeys, params: SpeedFilterParams) -> Self {
        Self {
            name: name.to_string(),
            keys,
            params,
            blocked_cycles: 0,
        }
    }

    pub fn blocked_cycles(&self) -> u32 {
        self.blocked_cycles
    }

    fn limit_speed_order(&self, speed_order: f64, current_speed: f64, target_speed: f64) -> f64 {
        let target_speed = target_speed.abs().min(self.params.max_speed);

        let acceleration = clamp(
            speed_order - current_speed,
            -self.params.max_acceleration,
            self.params.max_acceleration,
        );
        let mut speed_order = current_speed + acceleration;

        if speed_order.abs() < self.params.min_speed {
            if acceleration > 0.0 {
                speed_order = self.params.min_speed;
            }
            else if acceleration < 0.0 {
                speed_order = -self.params.min_speed;
            }
        }

        clamp(speed_order, -target_speed, target_speed)
    }

    fn check_blocking(&mut self, current_speed: f64, speed_error: f64) -> bool {
        if current_speed.abs() < self.params.anti_blocking_speed_threshold
            && speed_error.abs() > self.params.anti_blocking_error_threshold
        {
            self.blocked_cycles += 1;
        }
        else {
            self.blocked_cycles = 0;
        }

        self.blocked_cycles > self.params.anti_blocking_blocked_cycles_nb_threshold
    }
}

impl Controller for SpeedFilter {
    fn type_name(&self) -> &'static str {
        "SpeedFilter"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let k = &self.keys;

        let speed_order = match io.get_as::<f64>(&k.speed_order) {
            Some(s) => s,
            None => {
                warn!("{}: {} not available", self.type_name(), k.speed_order);
                return;
            }
        };
        let current_speed = io.get_or(&k.current_speed, 0.0f64);
        let target_speed = io.get_or(&k.target_speed, self.params.max_speed);
        let no_filter = io.get_as::<bool>(&k.speed_filter_flag).unwrap_or(false);

        let speed_order = if no_filter {
            speed_order
        }
        else {
            self.limit_speed_order(speed_order, current_speed, target_speed)
        };
        let speed_error = speed_order - current_speed;

        io.write(&self.keys.speed_order, speed_order);
        io.write(&self.keys.speed_error, speed_error);

        if self.params.anti_blocking && self.check_blocking(current_speed, speed_error) {
            debug!("{} [{}]: blocked for {} periods", self.type_name(), self.name, self.blocked_cycles);
            io.write(&self.keys.pose_reached, TargetPoseStatus::Blocked);
        }
    }

    fn reset(&mut self) {
        self.blocked_cycles = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> SpeedFilterParams {
        SpeedFilterParams {
            min_speed: 1.0,
            max_speed: 20.0,
            max_acceleration: 2.0,
            anti_blocking: true,
            anti_blocking_speed_threshold: 0.5,
            anti_blocking_error_threshold: 1.0,
            anti_blocking_blocked_cycles_nb_threshold: 2,
        }
    }

    #[test]
    fn test_limits() {
        let f = SpeedFilter::new("", SpeedFilterKeys::default(), params());

        // Acceleration limit
        assert_eq!(f.limit_speed_order(10.0, 3.0, 20.0), 5.0);
        assert_eq!(f.limit_speed_order(-10.0, 3.0, 20.0), 1.0);
        // Target cap, itself capped by the max speed
        assert_eq!(f.limit_speed_order(10.0, 9.0, 4.0), 4.0);
        assert_eq!(f.limit_speed_order(30.0, 19.0, 50.0), 20.0);
        // Minimum speed in the direction of the acceleration
        assert_eq!(f.limit_speed_order(0.2, 0.0, 20.0), 1.0);
        assert_eq!(f.limit_speed_order(-0.2, 0.0, 20.0), -1.0);
        assert_eq!(f.limit_speed_order(0.0, 0.0, 20.0), 0.0);
    }

    #[test]
    fn test_bypass_and_outputs() {
        let mut f = SpeedFilter::new("", SpeedFilterKeys::default(), SpeedFilterParams::default());
        let mut io = ControllersIO::new();

        io.write("linear_speed_order", 8.0);
        io.write("linear_current_speed", 2.0);
        io.write("linear_target_speed", 10.0);
        io.write("linear_speed_filter_flag", true);
        f.execute(&mut io);
        assert_eq!(io.get_as::<f64>("linear_speed_order"), Some(8.0));
        assert_eq!(io.get_as::<f64>("linear_speed_error"), Some(6.0));

        io.write("linear_speed_filter_flag", false);
        io.write("linear_speed_order", 8.0);
        f.execute(&mut io);
        assert_eq!(io.get_as::<f64>("linear_speed_order"), Some(3.0));
        assert!(!io.contains("pose_reached"));
    }

    #[test]
    fn test_blocking() {
        let mut f = SpeedFilter::new("", SpeedFilterKeys::default(), params());
        let mut io = ControllersIO::new();

        for i in 0..3 {
            io.write("linear_speed_order", 5.0);
            io.write("linear_current_speed", 0.0);
            io.write("pose_reached", TargetPoseStatus::Moving);
            f.execute(&mut io);

            let expected = if i < 2 { TargetPoseStatus::Moving } else { TargetPoseStatus::Blocked };
            assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), Some(expected));
        }

        // Moving again clears the count
        io.write("linear_speed_order", 5.0);
        io.write("linear_current_speed", 3.0);
        f.execute(&mut io);
        assert_eq!(f.blocked_cycles(), 0);
    }
}
