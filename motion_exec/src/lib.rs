//! # Motion control library
//!
//! This library gives the executables and benchmarks of the workspace access to the motion
//! control pipeline: the controllers IO blackboard, the controllers and their compositions, the
//! platform engine running them, and the obstacle avoidance feeding it targets.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Typed key/value blackboard shared by the controllers of a chain
pub mod io;

/// PID corrector
pub mod pid;

/// Controller trait and meta controllers composing them
pub mod ctrl;

/// Trapezoidal profiles and the controllers following them
pub mod traj;

/// Filters shaping the signals between the loops of a chain
pub mod filters;

/// Feedback controllers and chain observers
pub mod controllers;

/// Localisation from wheel odometry
pub mod loc;

/// Waypoint paths
pub mod path;

/// Conversion of speed commands into motor commands
pub mod drive;

/// Periodic execution of a chain against the platform or a single motor
pub mod engine;

/// Obstacle shapes, lists and collision primitives
pub mod obstacles;

/// Visibility graph and shortest route around the obstacles
pub mod avoidance;

/// Path following around the obstacles
pub mod planner;

/// Complete chains built from parameters
pub mod chains;

/// Simulated motors and encoders
pub mod sim;
