//! Controller forcing a set of IO keys to fixed values

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, warn};
use serde::Deserialize;

use super::Controller;
use crate::io::ControllersIO;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of keys a reset controller writes.
pub const MAX_RESET_KEYS: usize = 8;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A key and the value it is reset to.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetEntry {
    pub key: String,
    pub value: f64,
}

/// Writes each configured key with its value every period.
///
/// Placed at the head of a regime's chain, it clears the signals left over by the previous
/// regime.
pub struct ResetController {
    name: String,
    entries: Vec<ResetEntry>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ResetController {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::with_capacity(MAX_RESET_KEYS),
        }
    }

    /// Add a key to reset. Returns `false` if the controller is already full.
    pub fn add_entry(&mut self, key: &str, value: f64) -> bool {
        if self.entries.len() >= MAX_RESET_KEYS {
            warn!("ResetController {}: cannot reset more than {} keys", self.name, MAX_RESET_KEYS);
            return false;
        }

        self.entries.push(ResetEntry {
            key: key.to_string(),
            value,
        });
        true
    }

    pub fn with_entries(name: &str, entries: &[ResetEntry]) -> Self {
        let mut r = Self::new(name);
        for e in entries {
            r.add_entry(&e.key, e.value);
        }
        r
    }
}

impl Controller for ResetController {
    fn type_name(&self) -> &'static str {
        "ResetController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        for e in self.entries.iter() {
            debug!("ResetController {}: {} = {}", self.name, e.key, e.value);
            io.write(&e.key, e.value);
        }
    }
}
