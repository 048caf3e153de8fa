//! Profile tracker controller

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

/// IO keys of a `ProfileTrackerController`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfileTrackerKeys {
    /// Input: signed distance left to the target
    pub pose_error: String,

    /// Input: signed measured speed
    pub current_speed: String,

    /// Input: pulse asking for a new profile
    pub recompute_profile: String,

    /// Input: speed cap for new profiles, if any
    pub target_speed: Option<String>,

    /// Output: velocity of the profile at this period
    pub tracker_velocity: String,

    /// Output: measured minus theoretical remaining distance
    pub tracking_error: String,

    /// Output: whether the profile is over, if wanted
    pub profile_complete: Option<String>,
}

/// Follows a trapezoidal profile generated from the pose error.
///
/// Outputs the profile velocity and the tracking error, meant to be fed to a pose PID whose
/// correction is added to the velocity by a `TrackerCombinerController`. Once the profile is
/// over, or while none is running, the tracking error is the pose error itself so the PID alone
/// finishes the move.
pub struct ProfileTrackerController {
    name: String,
    keys: ProfileTrackerKeys,
    params: ProfileParams,
    profile: TrapezoidalProfile,
    period: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ProfileTrackerKeys {
    /// Default key names for an axis, e.g. `"linear"` or `"angular"`.
    pub fn for_axis(axis: &str) -> Self {
        Self {
            pose_error: format!("{}_pose_error", axis),
            current_speed: format!("{}_current_speed", axis),
            recompute_profile: format!("{}_recompute_profile", axis),
            target_speed: Some(format!("{}_target_speed", axis)),
            tracker_velocity: format!("{}_tracker_velocity", axis),
            tracking_error: format!("{}_tracking_error", axis),
            profile_complete: None,
        }
    }
}

impl Default for ProfileTrackerKeys {
    fn default() -> Self {
        Self::for_axis("linear")
    }
}

impl ProfileTrackerController {
    pub fn new(name: &str, keys: ProfileTrackerKeys, params: ProfileParams) -> Self {
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

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn params_mut(&mut self) -> &mut ProfileParams {
        &mut self.params
    }

    fn write_outputs(&self, io: &mut ControllersIO, velocity: f64, tracking_error: f64) {
        io.write(&self.keys.tracker_velocity, velocity);
        io.write(&self.keys.tracking_error, tracking_error);
    }

    fn write_complete(&self, io: &mut ControllersIO, complete: bool) {
        if let Some(ref key) = self.keys.profile_complete {
            io.write(key, complete);
        }
    }
}

impl Controller for ProfileTrackerController {
    fn type_name(&self) -> &'static str {
        "ProfileTrackerController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let recompute = io
            .get_as::<bool>(&self.keys.recompute_profile)
            .unwrap_or(false);

        // No profile running: position control on the raw pose error
        if !recompute && !self.profile.is_initialized() {
            let pose_error = io.get_as::<f64>(&self.keys.pose_error).unwrap_or(0.0);
            self.write_outputs(io, 0.0, pose_error);
            self.write_complete(io, false);
            return;
        }

        let pose_error = match io.get_as::<f64>(&self.keys.pose_error) {
            Some(e) => e,
            None => {
                error!(
                    "{}: {} not available",
                    self.type_name(),
                    self.keys.pose_error
                );
                self.write_outputs(io, 0.0, 0.0);
                self.write_complete(io, false);
                return;
            }
        };

        let current_speed = io.get_as::<f64>(&self.keys.current_speed).unwrap_or(0.0);

        let mut max_speed = self.params.max_speed;
        if let Some(ref key) = self.keys.target_speed {
            if let Some(target_speed) = io.get_as::<f64>(key) {
                max_speed = max_speed.min(target_speed);
            }
        }

        if recompute {
            // A new segment starts from rest, the measured speed is too noisy to start from
            let total = self.profile.generate(
                0.0,
                pose_error,
                self.params.acceleration,
                self.params.deceleration,
                max_speed,
                self.params.must_stop_at_end,
            );

            if total == 0 {
                warn!(
                    "{} [{}]: no profile generated for {:.3}",
                    self.type_name(),
                    self.name,
                    pose_error
                );
                self.write_outputs(io, 0.0, 0.0);
                self.write_complete(io, false);
                self.profile.reset();
                return;
            }

            debug!(
                "{} [{}]: new profile over {} periods for {:.3}",
                self.type_name(),
                self.name,
                total,
                pose_error
            );
            self.period = 0;
        }

        // The target moved to the other side: regenerate from the current speed
        let profile_target = self.profile.target_distance();
        if pose_error * profile_target < 0.0 {
            let total = self.profile.generate(
                current_speed,
                pose_error,
                self.params.acceleration,
                self.params.deceleration,
                max_speed,
                self.params.must_stop_at_end,
            );

            if total == 0 {
                self.write_outputs(io, 0.0, pose_error);
                self.write_complete(io, false);
                self.profile.reset();
                return;
            }

            debug!(
                "{} [{}]: direction change, new profile over {} periods",
                self.type_name(),
                self.name,
                total
            );
            self.period = 0;
        }

        let complete = self.period >= self.profile.total_periods();
        self.write_complete(io, complete);

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

#[cfg(test)]
mod test {
    use super::*;

    fn tracker() -> ProfileTrackerController {
        let mut keys = ProfileTrackerKeys::for_axis("linear");
        keys.profile_complete = Some("linear_profile_complete".to_string());
        ProfileTrackerController::new("linear", keys, ProfileParams::default())
    }

    #[test]
    fn test_follows_profile() {
        let mut ctrl = tracker();
        let mut io = ControllersIO::new();

        io.write("linear_pose_error", 1000.0);
        io.write("linear_recompute_profile", true);
        ctrl.execute(&mut io);
        assert_eq!(ctrl.profile().total_periods(), 110);
        assert_eq!(io.get_as::<f64>("linear_tracker_velocity"), Some(0.0));
        assert_eq!(io.get_as::<f64>("linear_tracking_error"), Some(0.0));
        assert_eq!(io.get_as::<bool>("linear_profile_complete"), Some(false));

        // The robot didn't move: it is behind the profile
        io.write("linear_recompute_profile", false);
        for _ in 0..9 {
            ctrl.execute(&mut io);
        }
        assert_eq!(io.get_as::<f64>("linear_tracker_velocity"), Some(9.0));
        assert_eq!(io.get_as::<f64>("linear_tracking_error"), Some(1000.0 - 959.5));
    }

    #[test]
    fn test_no_profile_passes_pose_error() {
        let mut ctrl = tracker();
        let mut io = ControllersIO::new();

        io.write("linear_pose_error", 12.0);
        ctrl.execute(&mut io);

        assert_eq!(io.get_as::<f64>("linear_tracker_velocity"), Some(0.0));
        assert_eq!(io.get_as::<f64>("linear_tracking_error"), Some(12.0));
        assert!(!ctrl.profile().is_initialized());
    }

    #[test]
    fn test_target_speed_caps_profile() {
        let mut ctrl = tracker();
        let mut io = ControllersIO::new();

        io.write("linear_pose_error", 1000.0);
        io.write("linear_target_speed", 5.0);
        io.write("linear_recompute_profile", true);
        ctrl.execute(&mut io);

        assert_eq!(ctrl.profile().plateau_velocity(), 5.0);
    }

    #[test]
    fn test_null_distance_resets_profile() {
        let mut ctrl = tracker();
        let mut io = ControllersIO::new();

        io.write("linear_pose_error", 0.0);
        io.write("linear_recompute_profile", true);
        ctrl.execute(&mut io);

        assert!(!ctrl.profile().is_initialized());
        assert_eq!(io.get_as::<f64>("linear_tracking_error"), Some(0.0));
    }

    #[test]
    fn test_sign_change_regenerates() {
        let mut ctrl = tracker();
        let mut io = ControllersIO::new();

        io.write("linear_pose_error", 100.0);
        io.write("linear_recompute_profile", true);
        ctrl.execute(&mut io);
        io.write("linear_recompute_profile", false);
        ctrl.execute(&mut io);
        assert_eq!(ctrl.period(), 2);

        // Overshoot
        io.write("linear_pose_error", -20.0);
        io.write("linear_current_speed", 0.0);
        ctrl.execute(&mut io);
        assert!(ctrl.profile().target_distance() < 0.0);
        assert_eq!(ctrl.period(), 1);
    }

    #[test]
    fn test_completion() {
        let mut ctrl = tracker();
        let mut io = ControllersIO::new();

        io.write("linear_pose_error", 2.0);
        io.write("linear_recompute_profile", true);
        ctrl.execute(&mut io);
        io.write("linear_recompute_profile", false);

        let total = ctrl.profile().total_periods();
        for _ in 0..total {
            ctrl.execute(&mut io);
        }
        assert_eq!(io.get_as::<bool>("linear_profile_complete"), Some(true));
        assert_eq!(io.get_as::<f64>("linear_tracker_velocity"), Some(0.0));
        assert_eq!(io.get_as::<f64>("linear_tracking_error"), Some(2.0));

        ctrl.reset();
        assert!(!ctrl.profile().is_initialized());
        assert_eq!(ctrl.period(), 0);
    }
}
