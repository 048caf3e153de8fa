//! Position loop controllers

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use serde::Deserialize;

use crate::{
    ctrl::Controller,
    io::ControllersIO,
    pid::{Pid, PidParams},
};
use util::maths::sign;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PosePidKeys {
    pub position_error: String,
    pub speed_order: String,

    /// Integer state key gating the controller, see `PosePidController::with_state_gating`
    pub current_state: Option<String>,
}

/// Turns a position error into a speed order.
///
/// With state gating the PID only runs while `current_state` equals the active state, in any
/// other state it outputs a null order.
pub struct PosePidController {
    name: String,
    keys: PosePidKeys,
    pid: Pid,
    active_state: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PassthroughPosePidKeys {
    pub position_error: String,
    pub target_speed: String,
    pub speed_order: String,
}

/// Outputs the target speed as the speed order, no position loop.
///
/// Used to tune the speed loops alone. When `signed` the order follows the sign of the position
/// error.
pub struct PassthroughPosePidController {
    name: String,
    keys: PassthroughPosePidKeys,
    signed: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PosePidKeys {
    pub fn for_axis(axis: &str) -> Self {
        Self {
            position_error: format!("{}_pose_error", axis),
            speed_order: format!("{}_speed_order", axis),
            current_state: None,
        }
    }

    /// Keys of the feedback correction in a tracker chain.
    pub fn for_tracker(axis: &str) -> Self {
        Self {
            position_error: format!("{}_tracking_error", axis),
            speed_order: format!("{}_feedback_correction", axis),
            current_state: None,
        }
    }
}

impl Default for PosePidKeys {
    fn default() -> Self {
        Self::for_axis("linear")
    }
}

impl PosePidController {
    pub fn new(name: &str, keys: PosePidKeys, params: &PidParams) -> Self {
        Self {
            name: name.to_string(),
            keys,
            pid: Pid::from_params(params),
            active_state: None,
        }
    }

    /// Only run while the `current_state` key equals `active_state`.
    pub fn with_state_gating(mut self, state_key: &str, active_state: i32) -> Self {
        self.keys.current_state = Some(state_key.to_string());
        self.active_state = Some(active_state);
        self
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    pub fn pid_mut(&mut self) -> &mut Pid {
        &mut self.pid
    }

    fn is_active(&self, io: &ControllersIO) -> bool {
        match (&self.keys.current_state, self.active_state) {
            (Some(key), Some(active)) => io.get_as::<i32>(key) == Some(active),
            _ => true,
        }
    }
}

impl Controller for PosePidController {
    fn type_name(&self) -> &'static str {
        "PosePIDController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        if !self.is_active(io) {
            io.write(&self.keys.speed_order, 0.0);
            return;
        }

        let position_error = match io.get_as::<f64>(&self.keys.position_error) {
            Some(e) => e,
            None => {
                warn!(
                    "{} [{}]: {} not available, using 0",
                    self.type_name(),
                    self.name,
                    self.keys.position_error
                );
                0.0
            }
        };

        let speed_order = self.pid.compute(position_error);
        io.write(&self.keys.speed_order, speed_order);
    }

    fn reset(&mut self) {
        self.pid.reset();
    }
}

impl PassthroughPosePidKeys {
    pub fn for_axis(axis: &str) -> Self {
        Self {
            position_error: format!("{}_pose_error", axis),
            target_speed: format!("{}_target_speed", axis),
            speed_order: format!("{}_speed_order", axis),
        }
    }
}

impl Default for PassthroughPosePidKeys {
    fn default() -> Self {
        Self::for_axis("linear")
    }
}

impl PassthroughPosePidController {
    pub fn new(name: &str, keys: PassthroughPosePidKeys, signed: bool) -> Self {
        Self {
            name: name.to_string(),
            keys,
            signed,
        }
    }
}

impl Controller for PassthroughPosePidController {
    fn type_name(&self) -> &'static str {
        "PassthroughPosePIDController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let target_speed = io.get_or(&self.keys.target_speed, 0.0f64);

        let speed_order = if self.signed {
            sign(io.get_or(&self.keys.position_error, 0.0f64)) * target_speed.abs()
        }
        else {
            target_speed
        };

        io.write(&self.keys.speed_order, speed_order);
    }
}
