//! Speed loop controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use serde::Deserialize;

use crate::{
    ctrl::Controller,
    io::ControllersIO,
    pid::{Pid, PidParams},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeedPidKeys {
    pub speed_order: String,
    pub current_speed: String,
    pub speed_command: String,

    /// When true the PID is reset and the key cleared
    pub reset: Option<String>,
}

/// Turns the speed error into the command sent to the drive.
pub struct SpeedPidController {
    name: String,
    keys: SpeedPidKeys,
    pid: Pid,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SpeedPidKeys {
    pub fn for_axis(axis: &str) -> Self {
        Self {
            speed_order: format!("{}_speed_order", axis),
            current_speed: format!("{}_current_speed", axis),
            speed_command: format!("{}_speed_command", axis),
            reset: Some(format!("{}_speed_pid_reset", axis)),
        }
    }
}

impl Default for SpeedPidKeys {
    fn default() -> Self {
        Self::for_axis("linear")
    }
}

impl SpeedPidController {
    pub fn new(name: &str, keys: SpeedPidKeys, params: &PidParams) -> Self {
        Self {
            name: name.to_string(),
            keys,
            pid: Pid::from_params(params),
        }
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    pub fn pid_mut(&mut self) -> &mut Pid {
        &mut self.pid
    }
}

impl Controller for SpeedPidController {
    fn type_name(&self) -> &'static str {
        "SpeedPIDController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        if let Some(ref key) = self.keys.reset {
            if io.get_as::<bool>(key).unwrap_or(false) {
                debug!("{} [{}]: reset requested", self.type_name(), self.name);
                self.pid.reset();
                io.write(key, false);
            }
        }

        let speed_order = io.get_or(&self.keys.speed_order, 0.0f64);
        let current_speed = io.get_or(&self.keys.current_speed, 0.0f64);

        let speed_command = self.pid.compute(speed_order - current_speed);
        io.write(&self.keys.speed_command, speed_command);
    }

    fn reset(&mut self) {
        self.pid.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_speed_pid() {
        let params = PidParams {
            kp: 0.0,
            ki: 1.0,
            ..Default::default()
        };
        let mut c = SpeedPidController::new("", SpeedPidKeys::default(), &params);
        let mut io = ControllersIO::new();

        // A pure integrator on an ideal plant follows the order with one period of delay
        io.write("linear_speed_order", 5.0);
        io.write("linear_current_speed", 0.0);
        c.execute(&mut io);
        assert_eq!(io.get_as::<f64>("linear_speed_command"), Some(5.0));

        io.write("linear_current_speed", 5.0);
        c.execute(&mut io);
        assert_eq!(io.get_as::<f64>("linear_speed_command"), Some(5.0));

        io.write("linear_speed_pid_reset", true);
        io.write("linear_speed_order", 1.0);
        c.execute(&mut io);
        assert_eq!(io.get_as::<f64>("linear_speed_command"), Some(-4.0));
        assert_eq!(io.get_as::<bool>("linear_speed_pid_reset"), Some(false));
        assert_eq!(c.pid().integral_term(), -4.0);
    }
}
