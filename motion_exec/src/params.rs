//! # Motion Executable Parameters
//!
//! This module provides parameters for the motion executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use motion_lib::{drive::DriveParams, loc::Pose, path::PathPose, planner::PlannerParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotionExecParams {
    /// Chain run by the engine
    pub chain: ChainKind,

    /// Parameter file of the chain, relative to the parameters directory
    pub chain_params: String,

    /// Parameter file of the obstacles, relative to the parameters directory
    pub obstacles_params: String,

    pub planner: PlannerParams,

    /// Simulated robot
    pub drive: DriveParams,

    pub initial_pose: Pose,

    /// Path followed when no script is given
    pub default_path: Vec<PathPose>,

    /// The executable stops after this long, 0 to run until the script or path is over.
    ///
    /// Units: seconds
    pub max_run_time_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainKind {
    QuadPid,
    QuadPidTracker,
    PurePursuit,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for MotionExecParams {
    fn default() -> Self {
        Self {
            chain: ChainKind::QuadPidTracker,
            chain_params: String::from("quadpid_tracker.toml"),
            obstacles_params: String::from("obstacles.toml"),
            planner: PlannerParams::default(),
            drive: DriveParams::default(),
            initial_pose: Pose::default(),
            default_path: Vec::new(),
            max_run_time_s: 0.0,
        }
    }
}
