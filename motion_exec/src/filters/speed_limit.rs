//! Speed magnitude limiting

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::{ctrl::Controller, io::ControllersIO};
use util::maths::sign;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeedLimitParams {
    /// Non null speeds are raised to at least this magnitude
    pub min_speed: f64,

    pub max_speed: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeedLimitKeys {
    /// Speed, limited in place
    pub target_speed: String,

    /// Optional copy of the limited speed
    pub output_speed: Option<String>,
}

/// Keeps a speed magnitude within `[min_speed, max_speed]`, zero excepted.
pub struct SpeedLimitFilter {
    name: String,
    keys: SpeedLimitKeys,
    params: SpeedLimitParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SpeedLimitParams {
    fn default() -> Self {
        Self {
            min_speed: 0.0,
            max_speed: 10.0,
        }
    }
}

impl SpeedLimitKeys {
    pub fn for_axis(axis: &str) -> Self {
        Self {
            target_speed: format!("{}_speed_order", axis),
            output_speed: None,
        }
    }
}

impl Default for SpeedLimitKeys {
    fn default() -> Self {
        Self::for_axis("linear")
    }
}

impl SpeedLimitFilter {
    pub fn new(name: &str, keys: SpeedLimitKeys, params: SpeedLimitParams) -> Self {
        Self {
            name: name.to_string(),
            keys,
            params,
        }
    }

    pub fn params_mut(&mut self) -> &mut SpeedLimitParams {
        &mut self.params
    }

    /// Limit a single speed.
    pub fn limit(&self, speed: f64) -> f64 {
        let magnitude = speed.abs();

        if magnitude > self.params.max_speed {
            sign(speed) * self.params.max_speed
        }
        else if magnitude > 0.0 && magnitude < self.params.min_speed {
            sign(speed) * self.params.min_speed
        }
        else {
            speed
        }
    }
}

impl Controller for SpeedLimitFilter {
    fn type_name(&self) -> &'static str {
        "SpeedLimitFilter"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let target_speed = match io.get_as::<f64>(&self.keys.target_speed) {
            Some(s) => s,
            None => return,
        };

        let limited = self.limit(target_speed);
        io.write(&self.keys.target_speed, limited);

        if let Some(ref output) = self.keys.output_speed {
            io.write(output, limited);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_limits() {
        let mut keys = SpeedLimitKeys::for_axis("angular");
        keys.output_speed = Some("angular_limited".to_string());
        let mut f = SpeedLimitFilter::new(
            "",
            keys,
            SpeedLimitParams {
                min_speed: 0.5,
                max_speed: 8.0,
            },
        );
        let mut io = ControllersIO::new();

        for &(input, output) in [(12.0, 8.0), (-12.0, -8.0), (3.0, 3.0), (0.1, 0.5), (-0.1, -0.5), (0.0, 0.0)].iter() {
            io.write("angular_speed_order", input);
            f.execute(&mut io);
            assert_eq!(io.get_as::<f64>("angular_speed_order"), Some(output));
            assert_eq!(io.get_as::<f64>("angular_limited"), Some(output));
        }
    }

    #[test]
    fn test_missing_key_is_noop() {
        let mut f = SpeedLimitFilter::new("", SpeedLimitKeys::default(), SpeedLimitParams::default());
        let mut io = ControllersIO::new();
        f.execute(&mut io);
        assert!(io.is_empty());
    }
}
