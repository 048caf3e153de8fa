//! Nominal velocity plus feedback correction

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::{ctrl::Controller, io::ControllersIO};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerCombinerKeys {
    pub tracker_velocity: String,
    pub feedback_correction: String,
    pub speed_order: Option<String>,

    /// Some chains drive the motors with the combined velocity directly
    pub speed_command: Option<String>,
}

/// Adds the profile tracker velocity and the correction of the tracking error.
pub struct TrackerCombinerController {
    name: String,
    keys: TrackerCombinerKeys,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedforwardCombinerKeys {
    pub feedforward_velocity: String,
    pub feedback_correction: String,
    pub speed_order: String,
    pub current_state: Option<String>,
}

/// Adds the feedforward velocity and the feedback correction.
///
/// Like the pose PID it may be gated on an integer state key, outputting 0 in other states.
pub struct FeedforwardCombinerController {
    name: String,
    keys: FeedforwardCombinerKeys,
    active_state: Option<i32>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrackerCombinerKeys {
    pub fn for_axis(axis: &str) -> Self {
        Self {
            tracker_velocity: format!("{}_tracker_velocity", axis),
            feedback_correction: format!("{}_feedback_correction", axis),
            speed_order: Some(format!("{}_speed_order", axis)),
            speed_command: None,
        }
    }
}

impl Default for TrackerCombinerKeys {
    fn default() -> Self {
        Self::for_axis("linear")
    }
}

impl TrackerCombinerController {
    pub fn new(name: &str, keys: TrackerCombinerKeys) -> Self {
        Self {
            name: name.to_string(),
            keys,
        }
    }
}

impl Controller for TrackerCombinerController {
    fn type_name(&self) -> &'static str {
        "TrackerCombinerController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let combined =
            io.get_or(&self.keys.tracker_velocity, 0.0f64) + io.get_or(&self.keys.feedback_correction, 0.0f64);

        if let Some(ref key) = self.keys.speed_order {
            io.write(key, combined);
        }
        if let Some(ref key) = self.keys.speed_command {
            io.write(key, combined);
        }
    }
}

impl FeedforwardCombinerKeys {
    pub fn for_axis(axis: &str) -> Self {
        Self {
            feedforward_velocity: format!("{}_feedforward_velocity", axis),
            feedback_correction: format!("{}_feedback_correction", axis),
            speed_order: format!("{}_speed_order", axis),
            current_state: None,
        }
    }
}

impl Default for FeedforwardCombinerKeys {
    fn default() -> Self {
        Self::for_axis("linear")
    }
}

impl FeedforwardCombinerController {
    pub fn new(name: &str, keys: FeedforwardCombinerKeys) -> Self {
        Self {
            name: name.to_string(),
            keys,
            active_state: None,
        }
    }

    pub fn with_state_gating(mut self, state_key: &str, active_state: i32) -> Self {
        self.keys.current_state = Some(state_key.to_string());
        self.active_state = Some(active_state);
        self
    }
}

impl Controller for FeedforwardCombinerController {
    fn type_name(&self) -> &'static str {
        "FeedforwardCombinerController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        if let (Some(key), Some(active)) = (&self.keys.current_state, self.active_state) {
            if io.get_as::<i32>(key) != Some(active) {
                io.write(&self.keys.speed_order, 0.0);
                return;
            }
        }

        let combined =
            io.get_or(&self.keys.feedforward_velocity, 0.0f64) + io.get_or(&self.keys.feedback_correction, 0.0f64);
        io.write(&self.keys.speed_order, combined);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tracker_combiner() {
        let mut keys = TrackerCombinerKeys::for_axis("angular");
        keys.speed_command = Some("angular_speed_command".to_string());
        let mut c = TrackerCombinerController::new("", keys);
        let mut io = ControllersIO::new();

        io.write("angular_tracker_velocity", 4.0);
        io.write("angular_feedback_correction", -0.5);
        c.execute(&mut io);
        assert_eq!(io.get_as::<f64>("angular_speed_order"), Some(3.5));
        assert_eq!(io.get_as::<f64>("angular_speed_command"), Some(3.5));
    }

    #[test]
    fn test_feedforward_combiner_gating() {
        let mut c = FeedforwardCombinerController::new("", FeedforwardCombinerKeys::default())
            .with_state_gating("state", 1);
        let mut io = ControllersIO::new();

        io.write("linear_feedforward_velocity", 6.0);
        io.write("linear_feedback_correction", 1.0);
        c.execute(&mut io);
        assert_eq!(io.get_as::<f64>("linear_speed_order"), Some(0.0));

        io.write("state", 1);
        c.execute(&mut io);
        assert_eq!(io.get_as::<f64>("linear_speed_order"), Some(7.0));
    }
}
