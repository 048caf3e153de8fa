//! # Path
//!
//! An ordered list of waypoints followed by the controller chain. The engine and the
//! `PathManagerFilter` share the path through a `SharedPath`: the engine (or the planner) loads
//! and starts it, the filter emits the current waypoint as the target and advances through
//! intermediate waypoints as they are reached.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex};
use serde::{Deserialize, Serialize};
use log::{debug, warn};

use crate::loc::Pose;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of waypoints in a path.
pub const PATH_MAX_POSES: usize = 32;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A waypoint of a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathPose {
    pub pose: Pose,

    /// Fraction of the platform maximum linear speed to use toward this waypoint
    pub max_speed_ratio_linear: f64,

    /// Fraction of the platform maximum angular speed to use toward this waypoint
    pub max_speed_ratio_angular: f64,

    pub motion_direction: MotionDirection,

    pub bypass_anti_blocking: bool,

    /// Time allowed to reach the waypoint, 0 for no timeout.
    ///
    /// Units: milliseconds
    pub timeout_ms: u32,

    /// Don't rotate to the waypoint orientation once there
    pub bypass_final_orientation: bool,

    /// The path continues after this waypoint
    pub is_intermediate: bool,

    /// Set by the planner when no route to the waypoint could be found
    #[serde(skip)]
    pub unreachable: bool,
}

/// The path being followed.
#[derive(Debug, Clone, Default)]
pub struct Path {
    poses: Vec<PathPose>,
    current: usize,
    started: bool,
    play_in_loop: bool,
}

/// Path shared between the engine and the chain.
pub type SharedPath = Arc<Mutex<Path>>;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Which way the robot may drive toward a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionDirection {
    Bidirectional,
    ForwardOnly,
    BackwardOnly,
}

/// Errors raised when editing a path.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Path is full ({} waypoints)", PATH_MAX_POSES)]
    Full,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for MotionDirection {
    fn default() -> Self {
        MotionDirection::Bidirectional
    }
}

impl MotionDirection {
    /// Integer representation stored in the controllers IO.
    pub fn as_i32(self) -> i32 {
        match self {
            MotionDirection::Bidirectional => 0,
            MotionDirection::ForwardOnly => 1,
            MotionDirection::BackwardOnly => 2,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(MotionDirection::Bidirectional),
            1 => Some(MotionDirection::ForwardOnly),
            2 => Some(MotionDirection::BackwardOnly),
            _ => None,
        }
    }
}

impl Default for PathPose {
    fn default() -> Self {
        Self {
            pose: Pose::default(),
            max_speed_ratio_linear: 1.0,
            max_speed_ratio_angular: 1.0,
            motion_direction: MotionDirection::default(),
            bypass_anti_blocking: false,
            timeout_ms: 0,
            bypass_final_orientation: false,
            is_intermediate: false,
            unreachable: false,
        }
    }
}

impl PathPose {
    pub fn new(x: f64, y: f64, o: f64) -> Self {
        Self {
            pose: Pose::new(x, y, o),
            ..Default::default()
        }
    }

    /// Builder style: mark the waypoint as intermediate.
    pub fn intermediate(mut self) -> Self {
        self.is_intermediate = true;
        self
    }

    /// Whether the robot may back into this waypoint.
    pub fn allow_reverse(&self) -> bool {
        self.motion_direction != MotionDirection::ForwardOnly
    }
}

impl Path {
    pub fn new(poses: Vec<PathPose>) -> Result<Self, PathError> {
        if poses.len() > PATH_MAX_POSES {
            return Err(PathError::Full);
        }

        Ok(Self {
            poses,
            ..Default::default()
        })
    }

    /// Wrap into a `SharedPath`.
    pub fn shared(self) -> SharedPath {
        Arc::new(Mutex::new(self))
    }

    pub fn set_play_in_loop(&mut self, play_in_loop: bool) {
        self.play_in_loop = play_in_loop;
    }

    /// Replace the waypoints, rewinding and stopping the path.
    pub fn load(&mut self, poses: Vec<PathPose>) -> Result<(), PathError> {
        if poses.len() > PATH_MAX_POSES {
            return Err(PathError::Full);
        }

        self.poses = poses;
        self.current = 0;
        self.started = false;
        Ok(())
    }

    pub fn push(&mut self, pose: PathPose) -> Result<(), PathError> {
        if self.poses.len() >= PATH_MAX_POSES {
            return Err(PathError::Full);
        }
        self.poses.push(pose);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.poses.clear();
        self.current = 0;
        self.started = false;
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn poses(&self) -> &[PathPose] {
        &self.poses
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The waypoint being targeted.
    pub fn current(&self) -> Option<&PathPose> {
        self.poses.get(self.current)
    }

    pub fn current_mut(&mut self) -> Option<&mut PathPose> {
        self.poses.get_mut(self.current)
    }

    /// Move on to the next waypoint.
    ///
    /// Returns false if the current waypoint is the last one, unless the path plays in loop in
    /// which case it wraps to the first waypoint.
    pub fn advance(&mut self) -> bool {
        if self.current + 1 < self.poses.len() {
            self.current += 1;
        }
        else if self.play_in_loop && !self.poses.is_empty() {
            self.current = 0;
        }
        else {
            return false;
        }

        debug!("Path: waypoint {}/{}", self.current + 1, self.poses.len());
        true
    }

    /// Go back to the previous waypoint, returns false on the first one.
    pub fn step_back(&mut self) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        true
    }

    /// Flag the current waypoint as unreachable and skip it.
    pub fn unreachable(&mut self) -> bool {
        match self.poses.get_mut(self.current) {
            Some(p) => {
                warn!("Path: waypoint {} unreachable", self.current);
                p.unreachable = true;
            }
            None => return false,
        }
        self.advance()
    }

    pub fn start(&mut self) {
        self.started = true;
    }

    pub fn stop(&mut self) {
        self.started = false;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Rewind to the first waypoint.
    pub fn reset(&mut self) {
        self.current = 0;
    }

    /// Whether the path is followed: started and not empty.
    pub fn is_active(&self) -> bool {
        self.started && !self.poses.is_empty()
    }

    /// Mirror every waypoint across the table's vertical axis, for the other side of the field.
    pub fn horizontal_mirror(&mut self) {
        for p in self.poses.iter_mut() {
            p.pose.y = -p.pose.y;
            p.pose.o = -p.pose.o;
        }
    }
}
