//! Periodic module interface
//!
//! Modules run at a fixed period by an executable (the platform engine for example) implement
//! [`State`]: they are initialised once against the session, then processed every period.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::session::Session;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A module processed once per period.
pub trait State {
    /// Name of the module in logs and archives.
    const NAME: &'static str;

    /// Data required during initialisation, usually the path to the parameter file.
    type InitData;

    type Input;
    type Output;

    /// Summary of what happened during one period.
    type Status;

    type Error: std::error::Error;

    /// Initialise the module, loading its parameters and opening its archives in `session`.
    fn init(&mut self, init_data: Self::InitData, session: &Session) -> Result<(), Self::Error>;

    /// Process one period.
    fn proc(&mut self, input: &Self::Input) -> Result<(Self::Output, Self::Status), Self::Error>;
}
