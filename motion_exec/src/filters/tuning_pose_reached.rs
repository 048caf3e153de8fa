//! Arrival detection for tuning runs

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
pub struct TuningPoseReachedKeys {
    pub profile_complete: String,
    pub pose_reached: String,
}

/// Declares the target reached as soon as the profile has been played, whatever the pose.
///
/// Tuning runs send a single axis along a profile and only care about the response.
pub struct TuningPoseReachedFilter {
    name: String,
    keys: TuningPoseReachedKeys,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TuningPoseReachedKeys {
    fn default() -> Self {
        Self {
            profile_complete: "linear_profile_complete".to_string(),
            pose_reached: "pose_reached".to_string(),
        }
    }
}

impl TuningPoseReachedFilter {
    pub fn new(name: &str, keys: TuningPoseReachedKeys) -> Self {
        Self {
            name: name.to_string(),
            keys,
        }
    }
}

impl Controller for TuningPoseReachedFilter {
    fn type_name(&self) -> &'static str {
        "TuningPoseReachedFilter"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let status = if io.get_as::<bool>(&self.keys.profile_complete).unwrap_or(false) {
            TargetPoseStatus::Reached
        }
        else {
            TargetPoseStatus::Moving
        };

        io.write(&self.keys.pose_reached, status);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_profile_complete() {
        let mut f = TuningPoseReachedFilter::new("", TuningPoseReachedKeys::default());
        let mut io = ControllersIO::new();

        f.execute(&mut io);
        assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), Some(TargetPoseStatus::Moving));

        io.write("linear_profile_complete", true);
        f.execute(&mut io);
        assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), Some(TargetPoseStatus::Reached));
    }
}
