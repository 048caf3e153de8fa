//! Straight line move decomposition
//!
//! Every move is split into three phases: rotate on the spot toward the target position, drive
//! straight to it, then rotate to the target orientation. The filter turns the current and target
//! poses into per-axis pose errors and speed caps for the loops downstream, and raises each
//! axis' recompute flag whenever a phase starts so that profile trackers plan the new segment.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    ctrl::Controller,
    io::{ControllersIO, TargetPoseStatus},
    loc::{Polar, Pose},
    path::MotionDirection,
};
use util::maths::limit_angle_deg;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Phases which may be chained within a single period.
const MAX_TRANSITIONS_PER_PERIOD: usize = 4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the `PoseStraightFilter`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoseStraightParams {
    /// Heading error below which the final rotation is done.
    ///
    /// Units: degrees
    pub angular_threshold: f64,

    /// Distance below which the position is reached.
    ///
    /// Units: millimeters
    pub linear_threshold: f64,

    /// Bearing error below which the robot starts driving toward the target.
    ///
    /// Units: degrees
    pub angular_intermediate_threshold: f64,

    /// Units: degrees/period²
    pub angular_deceleration: f64,

    /// Units: millimeters/period²
    pub linear_deceleration: f64,

    /// Never do the final rotation
    pub bypass_final_orientation: bool,
}

/// IO keys of the `PoseStraightFilter`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoseStraightKeys {
    pub current_pose_x: String,
    pub current_pose_y: String,
    pub current_pose_o: String,
    pub target_pose_x: String,
    pub target_pose_y: String,
    pub target_pose_o: String,
    pub current_linear_speed: String,
    pub current_angular_speed: String,
    pub target_linear_speed: String,
    pub target_angular_speed: String,
    pub motion_direction: String,
    pub bypass_final_orientation: String,

    pub linear_pose_error: String,
    pub linear_current_speed: String,
    pub linear_target_speed: String,
    pub linear_speed_filter_flag: String,
    pub linear_recompute_profile: String,
    pub angular_pose_error: String,
    pub angular_current_speed: String,
    pub angular_target_speed: String,
    pub angular_speed_filter_flag: String,
    pub angular_recompute_profile: String,
    pub pose_reached: String,
}

/// Decomposes moves into rotate, drive straight, rotate.
pub struct PoseStraightFilter {
    name: String,
    keys: PoseStraightKeys,
    params: PoseStraightParams,
    state: PoseStraightState,
    prev_target: Option<Pose>,
    locked_reverse: bool,
    phase_started: bool,
    logged_finished: bool,
}

/// Errors and speed caps produced for one period.
#[derive(Debug, Clone, Copy, Default)]
struct Setpoint {
    linear_error: f64,
    angular_error: f64,
    linear_target: f64,
    angular_target: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Phase of the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PoseStraightState {
    RotateToDirection,
    MoveToPosition,
    RotateToFinalAngle,
    Finished,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PoseStraightParams {
    fn default() -> Self {
        Self {
            angular_threshold: 1.0,
            linear_threshold: 1.0,
            angular_intermediate_threshold: 5.0,
            angular_deceleration: 1.0,
            linear_deceleration: 1.0,
            bypass_final_orientation: false,
        }
    }
}

impl Default for PoseStraightKeys {
    fn default() -> Self {
        Self {
            current_pose_x: "current_pose_x".into(),
            current_pose_y: "current_pose_y".into(),
            current_pose_o: "current_pose_O".into(),
            target_pose_x: "target_pose_x".into(),
            target_pose_y: "target_pose_y".into(),
            target_pose_o: "target_pose_O".into(),
            current_linear_speed: "current_linear_speed".into(),
            current_angular_speed: "current_angular_speed".into(),
            target_linear_speed: "target_linear_speed".into(),
            target_angular_speed: "target_angular_speed".into(),
            motion_direction: "motion_direction".into(),
            bypass_final_orientation: "bypass_final_orientation".into(),
            linear_pose_error: "linear_pose_error".into(),
            linear_current_speed: "linear_current_speed".into(),
            linear_target_speed: "linear_target_speed".into(),
            linear_speed_filter_flag: "linear_speed_filter_flag".into(),
            linear_recompute_profile: "linear_recompute_profile".into(),
            angular_pose_error: "angular_pose_error".into(),
            angular_current_speed: "angular_current_speed".into(),
            angular_target_speed: "angular_target_speed".into(),
            angular_speed_filter_flag: "angular_speed_filter_flag".into(),
            angular_recompute_profile: "angular_recompute_profile".into(),
            pose_reached: "pose_reached".into(),
        }
    }
}

impl PoseStraightFilter {
    pub fn new(name: &str, keys: PoseStraightKeys, params: PoseStraightParams) -> Self {
        Self {
            name: name.to_string(),
            keys,
            params,
            state: PoseStraightState::Finished,
            prev_target: None,
            locked_reverse: false,
            phase_started: false,
            logged_finished: false,
        }
    }

    pub fn state(&self) -> PoseStraightState {
        self.state
    }

    pub fn params(&self) -> &PoseStraightParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut PoseStraightParams {
        &mut self.params
    }

    /// Restart the state machine from the first rotation, keeping the other state.
    pub fn reset_current_state(&mut self) {
        self.enter(PoseStraightState::RotateToDirection);
    }

    /// Stop any motion, e.g. on an emergency stop.
    pub fn force_finished_state(&mut self) {
        self.state = PoseStraightState::Finished;
    }

    fn enter(&mut self, state: PoseStraightState) {
        debug!("{}: {:?} -> {:?}", self.type_name(), self.state, state);
        self.state = state;
        self.phase_started = true;
    }

    fn read_pose(io: &ControllersIO, x: &str, y: &str, o: &str) -> Pose {
        Pose::new(io.get_or(x, 0.0f64), io.get_or(y, 0.0f64), io.get_or(o, 0.0f64))
    }

    /// Run the state machine, possibly through several phases, and produce the setpoint.
    fn step(
        &mut self,
        pos_err: &Polar,
        current: &Pose,
        target: &Pose,
        target_speed: &Polar,
        bypass_final: bool,
    ) -> Setpoint {
        for _ in 0..MAX_TRANSITIONS_PER_PERIOD {
            match self.state {
                PoseStraightState::RotateToDirection => {
                    if pos_err.distance.abs() <= self.params.linear_threshold {
                        self.enter(PoseStraightState::RotateToFinalAngle);
                    }
                    else if pos_err.angle.abs() > self.params.angular_intermediate_threshold {
                        return Setpoint {
                            linear_error: 0.0,
                            angular_error: pos_err.angle,
                            linear_target: 0.0,
                            angular_target: target_speed.angle,
                        };
                    }
                    else {
                        // Aligned: overshoots from now on are corrected by backing up
                        self.locked_reverse = true;
                        self.enter(PoseStraightState::MoveToPosition);
                    }
                }
                PoseStraightState::MoveToPosition => {
                    if pos_err.distance.abs() <= self.params.linear_threshold {
                        self.enter(PoseStraightState::RotateToFinalAngle);
                    }
                    else {
                        return Setpoint {
                            linear_error: pos_err.distance,
                            angular_error: pos_err.angle,
                            linear_target: target_speed.distance,
                            angular_target: target_speed.angle,
                        };
                    }
                }
                PoseStraightState::RotateToFinalAngle => {
                    let final_error = limit_angle_deg(target.o - current.o);

                    if bypass_final || final_error.abs() <= self.params.angular_threshold {
                        self.enter(PoseStraightState::Finished);
                    }
                    else {
                        return Setpoint {
                            linear_error: 0.0,
                            angular_error: final_error,
                            linear_target: 0.0,
                            angular_target: target_speed.angle,
                        };
                    }
                }
                PoseStraightState::Finished => return Setpoint::default(),
            }
        }

        Setpoint::default()
    }
}

impl Controller for PoseStraightFilter {
    fn type_name(&self) -> &'static str {
        "PoseStraightFilter"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let k = &self.keys;
        let current = Self::read_pose(io, &k.current_pose_x, &k.current_pose_y, &k.current_pose_o);
        let target = Self::read_pose(io, &k.target_pose_x, &k.target_pose_y, &k.target_pose_o);
        let current_speed = Polar::new(
            io.get_or(&k.current_linear_speed, 0.0f64),
            io.get_or(&k.current_angular_speed, 0.0f64),
        );
        let target_speed = Polar::new(
            io.get_or(&k.target_linear_speed, 0.0f64),
            io.get_or(&k.target_angular_speed, 0.0f64),
        );
        let direction = io
            .get_as::<i32>(&k.motion_direction)
            .and_then(MotionDirection::from_i32)
            .unwrap_or_default();
        let bypass_final = self.params.bypass_final_orientation
            || io.get_as::<bool>(&k.bypass_final_orientation).unwrap_or(false);

        // A new target restarts the move
        if self.prev_target != Some(target) {
            self.prev_target = Some(target);
            self.locked_reverse = false;
            self.logged_finished = false;
            self.enter(PoseStraightState::RotateToDirection);
        }

        let mut pos_err = current.polar_error_to(&target);
        let must_reverse = !self.locked_reverse && direction == MotionDirection::BackwardOnly;
        let may_reverse = self.locked_reverse || direction == MotionDirection::Bidirectional;
        if must_reverse || (may_reverse && pos_err.angle.abs() > 90.0) {
            pos_err.reverse();
        }

        let mut setpoint = self.step(&pos_err, &current, &target, &target_speed, bypass_final);

        // Never ask for a speed that can't be braked before the target
        setpoint.linear_target = brake_limited(
            setpoint.linear_target.abs(),
            setpoint.linear_error,
            current_speed.distance,
            self.params.linear_deceleration,
        );
        setpoint.angular_target = brake_limited(
            setpoint.angular_target.abs(),
            setpoint.angular_error,
            current_speed.angle,
            self.params.angular_deceleration,
        );

        let recompute = std::mem::replace(&mut self.phase_started, false);

        let pose_reached = if self.state == PoseStraightState::Finished {
            if !self.logged_finished {
                info!(
                    "{}: target ({:.1}, {:.1}, {:.1}) reached",
                    self.type_name(),
                    target.x,
                    target.y,
                    target.o
                );
                self.logged_finished = true;
            }
            TargetPoseStatus::Reached
        }
        else {
            TargetPoseStatus::Moving
        };

        let k = &self.keys;
        io.write(&k.linear_pose_error, setpoint.linear_error);
        io.write(&k.linear_current_speed, current_speed.distance);
        io.write(&k.linear_target_speed, setpoint.linear_target);
        io.write(&k.linear_speed_filter_flag, false);
        io.write(&k.linear_recompute_profile, recompute);
        io.write(&k.angular_pose_error, setpoint.angular_error);
        io.write(&k.angular_current_speed, current_speed.angle);
        io.write(&k.angular_target_speed, setpoint.angular_target);
        io.write(&k.angular_speed_filter_flag, false);
        io.write(&k.angular_recompute_profile, recompute);
        io.write(&k.pose_reached, pose_reached);
    }

    fn reset(&mut self) {
        self.prev_target = None;
        self.locked_reverse = false;
        self.logged_finished = false;
        self.enter(PoseStraightState::RotateToDirection);
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Cap a speed so that the robot, currently at `current_speed`, can stop within `error`.
fn brake_limited(target: f64, error: f64, current_speed: f64, deceleration: f64) -> f64 {
    if deceleration <= 0.0 {
        return target;
    }

    let error = error.abs();
    if error <= current_speed * current_speed / (2.0 * deceleration) {
        target.min((2.0 * deceleration * error).sqrt())
    }
    else {
        target
    }
}
