//! Acceleration limiting of a speed order

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use serde::Deserialize;

use crate::{ctrl::Controller, io::ControllersIO};
use util::maths::sign;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccelerationParams {
    /// Maximum increase of the speed order magnitude per period.
    ///
    /// Units: per period²
    pub acceleration: f64,

    /// Orders smaller than this, but not null, are raised to it.
    pub min_speed: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccelerationKeys {
    /// Speed order, filtered in place
    pub target_speed: String,
}

/// Limits how fast the magnitude of a speed order can grow.
///
/// Decreasing orders go through untouched, braking is the deceleration filters' business.
pub struct AccelerationFilter {
    name: String,
    keys: AccelerationKeys,
    params: AccelerationParams,
    previous_speed_order: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for AccelerationParams {
    fn default() -> Self {
        Self {
            acceleration: 1.0,
            min_speed: 0.0,
        }
    }
}

impl AccelerationKeys {
    pub fn for_axis(axis: &str) -> Self {
        Self {
            target_speed: format!("{}_speed_order", axis),
        }
    }
}

impl Default for AccelerationKeys {
    fn default() -> Self {
        Self::for_axis("linear")
    }
}

impl AccelerationFilter {
    pub fn new(name: &str, keys: AccelerationKeys, params: AccelerationParams) -> Self {
        Self {
            name: name.to_string(),
            keys,
            params,
            previous_speed_order: 0.0,
        }
    }

    pub fn previous_speed_order(&self) -> f64 {
        self.previous_speed_order
    }
}

impl Controller for AccelerationFilter {
    fn type_name(&self) -> &'static str {
        "AccelerationFilter"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let mut speed_order = match io.get_as::<f64>(&self.keys.target_speed) {
            Some(s) => s,
            None => {
                warn!("{}: {} not available", self.type_name(), self.keys.target_speed);
                return;
            }
        };

        let abs_previous = self.previous_speed_order.abs();
        let abs_order = speed_order.abs();

        if abs_order > abs_previous {
            let max_allowed = (abs_previous + self.params.acceleration).max(self.params.min_speed);
            if abs_order > max_allowed {
                speed_order = sign(speed_order) * max_allowed;
            }
        }

        let abs_output = speed_order.abs();
        if abs_output > 0.0 && abs_output < self.params.min_speed {
            speed_order = sign(speed_order) * self.params.min_speed;
        }

        self.previous_speed_order = speed_order;
        io.write(&self.keys.target_speed, speed_order);
    }

    fn reset(&mut self) {
        self.previous_speed_order = 0.0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ramp() {
        let mut f = AccelerationFilter::new(
            "",
            AccelerationKeys::default(),
            AccelerationParams {
                acceleration: 1.0,
                min_speed: 0.5,
            },
        );
        let mut io = ControllersIO::new();

        let mut outputs = Vec::new();
        for _ in 0..4 {
            io.write("linear_speed_order", 10.0);
            f.execute(&mut io);
            outputs.push(io.get_as::<f64>("linear_speed_order").unwrap());
        }
        assert_eq!(outputs, vec![1.0, 2.0, 3.0, 4.0]);

        // Slowing down isn't limited
        io.write("linear_speed_order", 1.0);
        f.execute(&mut io);
        assert_eq!(io.get_as::<f64>("linear_speed_order"), Some(1.0));

        // Tiny orders are raised to the minimum speed, keeping their sign
        io.write("linear_speed_order", -0.2);
        f.execute(&mut io);
        assert_eq!(io.get_as::<f64>("linear_speed_order"), Some(-0.5));

        io.write("linear_speed_order", 0.0);
        f.execute(&mut io);
        assert_eq!(io.get_as::<f64>("linear_speed_order"), Some(0.0));

        f.execute(&mut io);
        f.reset();
        assert_eq!(f.previous_speed_order(), 0.0);
    }

    #[test]
    fn test_missing_key() {
        let mut f = AccelerationFilter::new("", AccelerationKeys::for_axis("angular"), AccelerationParams::default());
        let mut io = ControllersIO::new();

        f.execute(&mut io);
        assert!(!io.contains("angular_speed_order"));
    }
}
