//! Detection of new targets

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use serde::Deserialize;

use crate::{ctrl::Controller, io::ControllersIO};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetChangeKeys {
    pub target_pose_x: String,
    pub target_pose_y: String,
    pub target_pose_o: String,
    pub state: String,
    pub new_target: String,
}

/// Raises `new_target` for one period whenever the target changes.
///
/// In `Target` mode a change is any integer part of the target pose changing, so that sub
/// millimeter noise on a target doesn't restart the profiles. In `State` mode a change is the
/// state key entering the trigger state. The first period always raises the flag.
pub struct TargetChangeDetector {
    name: String,
    keys: TargetChangeKeys,
    mode: TargetChangeMode,
    previous_target: Option<[i64; 3]>,
    previous_state: Option<i32>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TargetChangeMode {
    Target,
    State { trigger_state: i32 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TargetChangeKeys {
    fn default() -> Self {
        Self {
            target_pose_x: "target_pose_x".to_string(),
            target_pose_y: "target_pose_y".to_string(),
            target_pose_o: "target_pose_O".to_string(),
            state: "pose_straight_state".to_string(),
            new_target: "new_target".to_string(),
        }
    }
}

impl TargetChangeDetector {
    pub fn new(name: &str, keys: TargetChangeKeys, mode: TargetChangeMode) -> Self {
        Self {
            name: name.to_string(),
            keys,
            mode,
            previous_target: None,
            previous_state: None,
        }
    }

    fn target_changed(&mut self, io: &ControllersIO) -> bool {
        let target = [
            io.get_or(&self.keys.target_pose_x, 0.0f64) as i64,
            io.get_or(&self.keys.target_pose_y, 0.0f64) as i64,
            io.get_or(&self.keys.target_pose_o, 0.0f64) as i64,
        ];

        let changed = self.previous_target != Some(target);
        self.previous_target = Some(target);
        changed
    }

    fn state_triggered(&mut self, io: &ControllersIO, trigger_state: i32) -> bool {
        let state = io.get_as::<i32>(&self.keys.state);

        let triggered = match self.previous_state {
            None => true,
            Some(previous) => state == Some(trigger_state) && previous != trigger_state,
        };

        // A missing state doesn't count as leaving the trigger state
        if let Some(s) = state {
            self.previous_state = Some(s);
        }
        else if self.previous_state.is_none() {
            self.previous_state = Some(i32::MIN);
        }

        triggered
    }
}

impl Controller for TargetChangeDetector {
    fn type_name(&self) -> &'static str {
        "TargetChangeDetector"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let new_target = match self.mode {
            TargetChangeMode::Target => self.target_changed(io),
            TargetChangeMode::State { trigger_state } => self.state_triggered(io, trigger_state),
        };

        if new_target {
            debug!("{} [{}]: new target", self.type_name(), self.name);
        }
        io.write(&self.keys.new_target, new_target);
    }

    fn reset(&mut self) {
        self.previous_target = None;
        self.previous_state = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_target_mode() {
        let mut d = TargetChangeDetector::new("", TargetChangeKeys::default(), TargetChangeMode::Target);
        let mut io = ControllersIO::new();
        io.write("target_pose_x", 100.2);

        let mut flags = Vec::new();
        for &x in [100.2, 100.7, 101.1, 101.1].iter() {
            io.write("target_pose_x", x);
            d.execute(&mut io);
            flags.push(io.get_as::<bool>("new_target").unwrap());
        }
        assert_eq!(flags, vec![true, false, true, false]);

        d.reset();
        d.execute(&mut io);
        assert_eq!(io.get_as::<bool>("new_target"), Some(true));
    }

    #[test]
    fn test_state_mode() {
        let mut d = TargetChangeDetector::new(
            "",
            TargetChangeKeys::default(),
            TargetChangeMode::State { trigger_state: 1 },
        );
        let mut io = ControllersIO::new();

        let mut flags = Vec::new();
        for &s in [0, 0, 1, 1, 2, 1].iter() {
            io.write("pose_straight_state", s);
            d.execute(&mut io);
            flags.push(io.get_as::<bool>("new_target").unwrap());
        }
        assert_eq!(flags, vec![true, false, true, false, false, true]);
    }
}
