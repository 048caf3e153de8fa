//! # Platform engine
//!
//! Runs the control pipeline of the platform once per period: update the localisation, publish
//! the robot state and target into the `ControllersIO`, execute the root controller, then send
//! the resulting command to the drive.
//!
//! Single actuators get the same treatment from a `MotorEngine`, with a distance along their axis
//! in place of the platform pose.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod motor;
mod params;
mod state;
mod thread;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use motor::*;
pub use params::*;
pub use state::*;
pub use thread::*;

use crate::path::PathError;
use util::{archive::ArchiveError, params::LoadError};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Cannot load the engine parameters: {0}")]
    ParamsError(#[from] LoadError),

    #[error("Cannot open the engine archive: {0}")]
    ArchiveError(#[from] ArchiveError),

    #[error("Invalid path: {0}")]
    PathError(#[from] PathError),

    #[error("The shared path lock is poisoned")]
    PathPoisoned,

    #[error("The engine lock is poisoned")]
    EnginePoisoned,

    #[error("The engine thread is already running")]
    AlreadyRunning,

    #[error("Cannot spawn the engine thread: {0}")]
    SpawnError(std::io::Error),
}
