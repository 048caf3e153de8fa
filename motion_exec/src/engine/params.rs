//! Parameters of the platform engine

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Control period.
    ///
    /// Units: milliseconds
    pub period_ms: u64,

    /// Target linear speed of a move at full ratio.
    ///
    /// Units: millimeters/period
    pub max_linear_speed: f64,

    /// Target angular speed of a move at full ratio.
    ///
    /// Units: degrees/period
    pub max_angular_speed: f64,

    /// Declare a `Timeout` when a target isn't reached in time
    pub timeout_enabled: bool,

    /// Timeout used when the target doesn't give one, 0 for none.
    ///
    /// Units: milliseconds
    pub default_timeout_ms: u32,

    /// Archive every period's record, when the engine has been initialised with a session
    pub archive: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            period_ms: 20,
            max_linear_speed: 10.0,
            max_angular_speed: 5.0,
            timeout_enabled: false,
            default_timeout_ms: 0,
            archive: true,
        }
    }
}

impl EngineParams {
    /// Number of periods in `ms`, rounded up.
    pub fn ms_to_cycles(&self, ms: u32) -> u32 {
        let period = self.period_ms.max(1);
        ((ms as u64 + period - 1) / period) as u32
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ms_to_cycles() {
        let params = EngineParams::default();

        assert_eq!(params.ms_to_cycles(0), 0);
        assert_eq!(params.ms_to_cycles(20), 1);
        assert_eq!(params.ms_to_cycles(21), 2);
    }

    #[test]
    fn test_shipped_params() {
        let params: EngineParams =
            util::params::from_str(include_str!("../../../params/engine.toml")).unwrap();

        assert_eq!(params.period_ms, 20);
        assert!(params.timeout_enabled);
        assert_eq!(params.ms_to_cycles(params.default_timeout_ms), 1500);
    }
}
