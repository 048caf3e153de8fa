//! Braking distance limiting of a speed order

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{trace, warn};
use serde::Deserialize;

use crate::{ctrl::Controller, io::ControllersIO};
use util::maths::sign;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecelerationParams {
    /// Units: per period²
    pub deceleration: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecelerationKeys {
    pub pose_error: String,
    pub current_speed: String,

    /// Speed cap, filtered in place
    pub target_speed: String,
}

/// Caps the speed to `sqrt(2·d·|error|)` once the robot is within its braking distance.
pub struct DecelerationFilter {
    name: String,
    keys: DecelerationKeys,
    params: DecelerationParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for DecelerationParams {
    fn default() -> Self {
        Self { deceleration: 1.0 }
    }
}

impl DecelerationKeys {
    pub fn for_axis(axis: &str) -> Self {
        Self {
            pose_error: format!("{}_pose_error", axis),
            current_speed: format!("{}_current_speed", axis),
            target_speed: format!("{}_target_speed", axis),
        }
    }
}

impl Default for DecelerationKeys {
    fn default() -> Self {
        Self::for_axis("linear")
    }
}

impl DecelerationFilter {
    pub fn new(name: &str, keys: DecelerationKeys, params: DecelerationParams) -> Self {
        Self {
            name: name.to_string(),
            keys,
            params,
        }
    }
}

impl Controller for DecelerationFilter {
    fn type_name(&self) -> &'static str {
        "DecelerationFilter"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let pose_error = match io.get_as::<f64>(&self.keys.pose_error) {
            Some(e) => e,
            None => {
                warn!("{}: {} not available", self.type_name(), self.keys.pose_error);
                return;
            }
        };
        let current_speed = io.get_or(&self.keys.current_speed, 0.0f64);
        let mut speed_order = io.get_or(&self.keys.target_speed, 0.0f64);

        if self.params.deceleration > 0.0 {
            let braking_distance = current_speed * current_speed / (2.0 * self.params.deceleration);

            if pose_error.abs() <= braking_distance {
                let decel_speed = (2.0 * self.params.deceleration * pose_error.abs()).sqrt();
                if decel_speed < speed_order.abs() {
                    trace!(
                        "{} [{}]: {:.3} limited to {:.3}",
                        self.type_name(),
                        self.name,
                        speed_order,
                        decel_speed
                    );
                    speed_order = sign(speed_order) * decel_speed;
                }
            }
        }

        io.write(&self.keys.target_speed, speed_order);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_braking_cap() {
        let mut f = DecelerationFilter::new("", DecelerationKeys::default(), DecelerationParams { deceleration: 2.0 });
        let mut io = ControllersIO::new();

        // 10 mm/period at 2 mm/period² needs 25 mm
        io.write("linear_current_speed", 10.0);
        io.write("linear_target_speed", 10.0);
        io.write("linear_pose_error", 30.0);
        f.execute(&mut io);
        assert_eq!(io.get_as::<f64>("linear_target_speed"), Some(10.0));

        io.write("linear_pose_error", -16.0);
        f.execute(&mut io);
        let speed = io.get_as::<f64>("linear_target_speed").unwrap();
        assert!((speed - (2.0f64 * 2.0 * 16.0).sqrt()).abs() < 1e-9);

        // Negative orders keep their sign
        io.write("linear_target_speed", -10.0);
        io.write("linear_pose_error", 9.0);
        f.execute(&mut io);
        let speed = io.get_as::<f64>("linear_target_speed").unwrap();
        assert!((speed + (2.0f64 * 2.0 * 9.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_speed_never_exceeds_braking_speed() {
        let mut f = DecelerationFilter::new("", DecelerationKeys::default(), DecelerationParams { deceleration: 1.0 });
        let mut io = ControllersIO::new();

        // Within the braking distance the cap is exactly sqrt(2·d·|error|)
        for &(error, speed) in [(1.0, 5.0), (10.0, 5.0), (12.5, 5.0), (0.0, 3.0), (4.5, 3.0), (-8.0, 4.0)].iter() {
            io.write("linear_pose_error", error);
            io.write("linear_current_speed", speed);
            io.write("linear_target_speed", 100.0);
            f.execute(&mut io);

            let cap = io.get_as::<f64>("linear_target_speed").unwrap();
            let expected = (2.0f64 * 1.0 * f64::abs(error)).sqrt();
            assert!((cap - expected).abs() < 1e-9, "error {}, speed {}: {} != {}", error, speed, cap, expected);
        }

        // Beyond it the order goes through untouched
        for &(error, speed) in [(12.6, 5.0), (100.0, 3.0), (-5.0, 3.0)].iter() {
            io.write("linear_pose_error", error);
            io.write("linear_current_speed", speed);
            io.write("linear_target_speed", 100.0);
            f.execute(&mut io);
            assert_eq!(io.get_as::<f64>("linear_target_speed"), Some(100.0));
        }

        // An order already below the cap is kept
        io.write("linear_pose_error", 8.0);
        io.write("linear_current_speed", 5.0);
        io.write("linear_target_speed", 2.0);
        f.execute(&mut io);
        assert_eq!(io.get_as::<f64>("linear_target_speed"), Some(2.0));
    }
}
