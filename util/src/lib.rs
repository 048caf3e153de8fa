//! Utility library for the motion control software
//!
//! Provides the ambient services shared by every executable in the workspace: sessions, logging,
//! parameter loading, archiving and scripted command playback.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod archive;
pub mod host;
#[macro_use]
pub mod logger;
pub mod maths;
pub mod module;
pub mod params;
pub mod session;
pub mod script_interpreter;
pub mod time;
