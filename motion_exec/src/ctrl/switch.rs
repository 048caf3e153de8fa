//! Conditional switch between two controllers

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use owo_colors::OwoColorize;

use super::{
    dump_controller, dump_line, execute_controller, next_meta_id, reset_controller, Controller,
    ControllerRef, MetaError, MetaId,
};
use crate::io::ControllersIO;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Executes one of two controllers depending on a boolean IO key.
///
/// A missing key reads as `false`.
pub struct ConditionalSwitchMetaController {
    id: MetaId,
    name: String,
    condition_key: String,
    when_true: ControllerRef,
    when_false: ControllerRef,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ConditionalSwitchMetaController {
    pub fn new(
        name: &str,
        condition_key: &str,
        when_true: ControllerRef,
        when_false: ControllerRef,
    ) -> Result<Self, MetaError> {
        let id = next_meta_id();

        when_true.claim(id)?;
        if let Err(e) = when_false.claim(id) {
            when_true.release(id);
            return Err(e);
        }

        Ok(Self {
            id,
            name: name.to_string(),
            condition_key: condition_key.to_string(),
            when_true,
            when_false,
        })
    }

    pub fn id(&self) -> MetaId {
        self.id
    }
}

impl Controller for ConditionalSwitchMetaController {
    fn type_name(&self) -> &'static str {
        "ConditionalSwitchMetaController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let condition = io.get_or(&self.condition_key, false);

        trace!("ConditionalSwitchMetaController {}: {}", self.name, condition);

        if condition {
            execute_controller(&self.when_true, io);
        } else {
            execute_controller(&self.when_false, io);
        }
    }

    fn reset(&mut self) {
        reset_controller(&self.when_true);
        reset_controller(&self.when_false);
    }

    fn dump(&self, depth: usize) -> String {
        format!(
            "{}\n{:indent$}[{} = true]\n{}\n{:indent$}[{} = false]\n{}",
            dump_line(depth, &self.type_name().bold().to_string(), &self.name),
            "",
            self.condition_key,
            dump_controller(&self.when_true, depth + 2),
            "",
            self.condition_key,
            dump_controller(&self.when_false, depth + 2),
            indent = (depth + 1) * 2
        )
    }
}

impl Drop for ConditionalSwitchMetaController {
    fn drop(&mut self) {
        self.when_true.release(self.id);
        self.when_false.release(self.id);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctrl::{handle, test_utils::KeyWriter, NoOpController};

    #[test]
    fn test_switch() {
        let strong = handle(KeyWriter::new("angular_speed_order", 10.0));
        let hold = handle(KeyWriter::new("angular_speed_order", 0.0));

        let mut switch = ConditionalSwitchMetaController::new(
            "angular_regime",
            "is_rotating",
            strong.clone(),
            hold.clone(),
        )
        .unwrap();

        let mut io = ControllersIO::new();

        // Missing key reads as false
        switch.execute(&mut io);
        assert_eq!(io.get_as::<f64>("angular_speed_order"), Some(0.0));

        io.write("is_rotating", true);
        switch.execute(&mut io);
        assert_eq!(io.get_as::<f64>("angular_speed_order"), Some(10.0));

        assert_eq!(strong.lock().unwrap().executions, 1);
        assert_eq!(hold.lock().unwrap().executions, 1);
        assert!(switch.dump(0).contains("[is_rotating = true]"));
    }

    #[test]
    fn test_switch_ownership() {
        let a = handle(KeyWriter::new("a", 1.0));
        let b = handle(KeyWriter::new("b", 1.0));

        let switch = ConditionalSwitchMetaController::new("s", "k", a.clone(), b.clone()).unwrap();
        let id = switch.id();
        assert!(ConditionalSwitchMetaController::new("s2", "k", b.clone(), a.clone()).is_err());
        assert_eq!(a.owner(), Some(id));

        drop(switch);
        assert_eq!(a.owner(), None);
        assert_eq!(b.owner(), None);
    }

    #[test]
    fn test_noop_branch() {
        let pose_loop = handle(KeyWriter::new("angular_speed_order", 3.0));
        let mut switch =
            ConditionalSwitchMetaController::new("rotation", "rotating_in_place", pose_loop.clone(), handle(NoOpController))
                .unwrap();

        let mut io = ControllersIO::new();
        io.write("angular_speed_order", 1.0);
        io.clear_modified();

        switch.execute(&mut io);
        assert_eq!(io.get_as::<f64>("angular_speed_order"), Some(1.0));
        assert!(io.snapshot_modified().is_empty());

        io.write("rotating_in_place", true);
        switch.execute(&mut io);
        assert_eq!(io.get_as::<f64>("angular_speed_order"), Some(3.0));
        assert_eq!(pose_loop.lock().unwrap().executions, 1);
    }
}
