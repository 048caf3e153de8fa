//! Stall detection

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use serde::Deserialize;

use crate::{
    ctrl::Controller,
    io::{ControllersIO, TargetPoseStatus},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AntiBlockingParams {
    pub enabled: bool,

    /// Below this speed the robot may be stalled
    pub speed_threshold: f64,

    /// Above this speed error the robot may be stalled
    pub error_threshold: f64,

    /// Consecutive stalled periods tolerated before the target is declared blocked
    pub cycles_threshold: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AntiBlockingKeys {
    pub speed_order: String,
    pub current_speed: String,
    pub speed_error: String,
    pub pose_reached: String,

    /// When true the detection is skipped for this period
    pub bypass: Option<String>,
}

/// Detects a robot commanded to move which doesn't.
///
/// The counter of stalled periods restarts from zero on any period where the condition doesn't
/// hold. The controller only ever writes `Blocked`, clearing the status is left to whoever set
/// the target.
pub struct AntiBlockingController {
    name: String,
    keys: AntiBlockingKeys,
    params: AntiBlockingParams,
    blocked_cycles: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for AntiBlockingParams {
    fn default() -> Self {
        Self {
            enabled: true,
            speed_threshold: 0.1,
            error_threshold: 1.0,
            cycles_threshold: 10,
        }
    }
}

impl AntiBlockingKeys {
    pub fn for_axis(axis: &str) -> Self {
        Self {
            speed_order: format!("{}_speed_order", axis),
            current_speed: format!("{}_current_speed", axis),
            speed_error: format!("{}_speed_error", axis),
            pose_reached: "pose_reached".to_string(),
            bypass: Some("bypass_anti_blocking".to_string()),
        }
    }
}

impl Default for AntiBlockingKeys {
    fn default() -> Self {
        Self::for_axis("linear")
    }
}

impl AntiBlockingController {
    pub fn new(name: &str, keys: AntiBlockingKeys, params: AntiBlockingParams) -> Self {
        Self {
            name: name.to_string(),
            keys,
            params,
            blocked_cycles: 0,
        }
    }

    pub fn blocked_cycles(&self) -> u32 {
        self.blocked_cycles
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.params.enabled = enabled;
        if !enabled {
            self.blocked_cycles = 0;
        }
    }
}

impl Controller for AntiBlockingController {
    fn type_name(&self) -> &'static str {
        "AntiBlockingController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let speed_order = io.get_or(&self.keys.speed_order, 0.0f64);
        let current_speed = io.get_or(&self.keys.current_speed, 0.0f64);
        let speed_error = speed_order - current_speed;

        io.write(&self.keys.speed_error, speed_error);

        let bypassed = self
            .keys
            .bypass
            .as_ref()
            .and_then(|k| io.get_as::<bool>(k))
            .unwrap_or(false);

        if !self.params.enabled || bypassed {
            self.blocked_cycles = 0;
            return;
        }

        if current_speed.abs() < self.params.speed_threshold && speed_error.abs() > self.params.error_threshold {
            self.blocked_cycles += 1;
        }
        else {
            self.blocked_cycles = 0;
        }

        if self.blocked_cycles > self.params.cycles_threshold {
            warn!(
                "{} [{}]: blocked for {} periods",
                self.type_name(),
                self.name,
                self.blocked_cycles
            );
            io.write(&self.keys.pose_reached, TargetPoseStatus::Blocked);
        }
    }

    fn reset(&mut self) {
        self.blocked_cycles = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn controller() -> AntiBlockingController {
        AntiBlockingController::new(
            "",
            AntiBlockingKeys::default(),
            AntiBlockingParams {
                enabled: true,
                speed_threshold: 0.5,
                error_threshold: 1.0,
                cycles_threshold: 3,
            },
        )
    }

    #[test]
    fn test_trip_and_latch() {
        let mut c = controller();
        let mut io = ControllersIO::new();
        io.write("pose_reached", TargetPoseStatus::Moving);
        io.write("linear_speed_order", 5.0);
        io.write("linear_current_speed", 0.0);

        for _ in 0..3 {
            c.execute(&mut io);
            assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), Some(TargetPoseStatus::Moving));
        }
        c.execute(&mut io);
        assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), Some(TargetPoseStatus::Blocked));
        assert_eq!(io.get_as::<f64>("linear_speed_error"), Some(5.0));

        // One good period clears the counter but not the status
        io.write("linear_current_speed", 5.0);
        c.execute(&mut io);
        assert_eq!(c.blocked_cycles(), 0);
        assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), Some(TargetPoseStatus::Blocked));
    }

    #[test]
    fn test_disabled_and_bypass() {
        let mut c = controller();
        let mut io = ControllersIO::new();
        io.write("pose_reached", TargetPoseStatus::Moving);
        io.write("linear_speed_order", 5.0);
        io.write("linear_current_speed", 0.0);
        io.write("bypass_anti_blocking", true);

        for _ in 0..10 {
            c.execute(&mut io);
        }
        assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), Some(TargetPoseStatus::Moving));

        io.write("bypass_anti_blocking", false);
        c.set_enabled(false);
        for _ in 0..10 {
            c.execute(&mut io);
        }
        assert_eq!(c.blocked_cycles(), 0);
        assert_eq!(io.get_as::<f64>("linear_speed_error"), Some(5.0));
    }
}
