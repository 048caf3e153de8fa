//! Profile feedforward controller
//!
//! Same profile following as the tracker, with two differences: a new profile starts from the
//! measured speed, and the controller clears the recompute flag itself once it has consumed it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, error, warn};
use serde::Deserialize;

use super::{follow, ProfileParams, TrapezoidalProfile};
use crate::{ctrl::Controller, io::ControllersIO};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// IO keys of a `ProfileFeedforwardController`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfileFeedforwardKeys {
    pub pose_error: String,
    pub current_speed: String,
    pub recompute_profile: String,

    /// Input: drop the running profile when true, if configured
    pub invalidate_profile: Option<String>,

    pub feedforward_velocity: String,
    pub tracking_error: String,
    pub profile_complete: Option<String>,
}

pub struct ProfileFeedforwardController {
    name: String,
    keys: ProfileFeedforwardKeys,
    params: ProfileParams,
    profile: TrapezoidalProfile,
    period: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ProfileFeedforwardKeys {
    pub fn for_axis(axis: &str) -> Self {
        Self {
            pose_error: format!("{}_pose_error", axis),
            current_speed: format!("{}_current_speed", axis),
            recompute_profile: format!("{}_recompute_profile", axis),
            invalidate_profile: None,
            feedforward_velocity: format!("{}_feedforward_velocity", axis),
            tracking_error: format!("{}_tracking_error", axis),
            profile_complete: None,
        }
    }
}

impl Default for ProfileFeedforwardKeys {
    fn default() -> Self {
        Self::for_axis("linear")
    }
}

impl ProfileFeedforwardController {
    pub fn new(name: &str, keys: ProfileFeedforwardKeys, params: ProfileParams) -> Self {
        Self {
            name: name.to_string(),
            keys,
            params,
            profile: TrapezoidalProfile::new(),
            period: 0,
        }
    }

    pub fn profile(&self) -> &TrapezoidalProfile {
        &self.profile
    }

    fn write_outputs(&self, io: &mut ControllersIO, velocity: f64, tracking_error: f64) {
        io.write(&self.keys.feedforward_velocity, velocity);
        io.write(&self.keys.tracking_error, tracking_error);
    }
}

impl Controller for ProfileFeedforwardController {
    fn type_name(&self) -> &'static str {
        "ProfileFeedforwardController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        if let Some(ref key) = self.keys.invalidate_profile {
            if io.get_as::<bool>(key).unwrap_or(false) {
                debug!("{} [{}]: profile invalidated", self.type_name(), self.name);
                self.profile.reset();
            }
        }

        let recompute = io
            .get_as::<bool>(&self.keys.recompute_profile)
            .unwrap_or(false);

        if !recompute && !self.profile.is_initialized() {
            let pose_error = io.get_as::<f64>(&self.keys.pose_error).unwrap_or(0.0);
            self.write_outputs(io, 0.0, pose_error);
            return;
        }

        let pose_error = match io.get_as::<f64>(&self.keys.pose_error) {
            Some(e) => e,
            None => {
                error!("{}: {} not available", self.type_name(), self.keys.pose_error);
                self.write_outputs(io, 0.0, 0.0);
                return;
            }
        };

        if recompute {
            let mut current_speed = io
                .get_as::<f64>(&self.keys.current_speed)
                .map(f64::abs)
                .unwrap_or(0.0);
            if current_speed > self.params.max_speed {
                warn!(
                    "{} [{}]: current speed {:.3} clamped to {:.3}",
                    self.type_name(),
                    self.name,
                    current_speed,
                    self.params.max_speed
                );
                current_speed = self.params.max_speed;
            }

            let total = self.profile.generate(
                current_speed,
                pose_error,
                self.params.acceleration,
                self.params.deceleration,
                self.params.max_speed,
                self.params.must_stop_at_end,
            );

            io.write(&self.keys.recompute_profile, false);

            if total == 0 {
                warn!(
                    "{} [{}]: no profile generated for {:.3}",
                    self.type_name(),
                    self.name,
                    pose_error
                );
                self.write_outputs(io, 0.0, 0.0);
                self.profile.reset();
                return;
            }

            self.period = 0;
        }

        let complete = self.period >= self.profile.total_periods();
        if let Some(ref key) = self.keys.profile_complete {
            io.write(key, complete);
        }

        if complete {
            self.write_outputs(io, 0.0, pose_error);
            return;
        }

        let (velocity, tracking_error) = follow(&self.profile, self.period, pose_error);
        self.write_outputs(io, velocity, tracking_error);

        self.period += self.params.period_increment;
    }

    fn reset(&mut self) {
        self.profile.reset();
        self.period = 0;
    }
}
