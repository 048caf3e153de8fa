//! # Controllers
//!
//! Feedback controllers built around a `Pid`, the combiners which add a profile velocity to its
//! correction, the adaptive pure pursuit path follower, stall detection, and a few helpers
//! observing the chain (target changes, telemetry).

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod anti_blocking;
mod combiner;
mod pose_pid;
mod pure_pursuit;
mod speed_pid;
mod target_change;
mod telemetry;

pub use anti_blocking::*;
pub use combiner::*;
pub use pose_pid::*;
pub use pure_pursuit::*;
pub use speed_pid::*;
pub use target_change::*;
pub use telemetry::*;
