//! # Filters
//!
//! Filters shape the signals flowing between the loops of a chain: they turn poses into errors,
//! cap speeds to what the robot can brake from, limit accelerations and decide when a target is
//! reached. Unlike the PID based controllers they hold little state, most of them rewrite a key
//! in place.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod acceleration;
mod deceleration;
mod motor_pose;
mod path_manager;
mod pose_error;
mod pose_straight;
mod speed_filter;
mod speed_limit;
mod tuning_pose_reached;

pub use acceleration::*;
pub use deceleration::*;
pub use motor_pose::*;
pub use path_manager::*;
pub use pose_error::*;
pub use pose_straight::*;
pub use speed_filter::*;
pub use speed_limit::*;
pub use tuning_pose_reached::*;
