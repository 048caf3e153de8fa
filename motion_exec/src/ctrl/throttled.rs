//! Periodic execution of a controller at a fraction of the engine rate

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{error, warn};
use owo_colors::OwoColorize;

use super::{
    dump_controller, dump_line, execute_controller, next_meta_id, reset_controller, Controller,
    ControllerRef, MetaError, MetaId,
};
use crate::io::ControllersIO;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Executes the wrapped controller once every `period_divider` periods.
///
/// The wrapped controller runs on the first period, and on the first period after a reset.
pub struct ThrottledController {
    id: MetaId,
    name: String,
    controller: ControllerRef,
    period_divider: u32,
    count: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ThrottledController {
    pub fn new(name: &str, controller: ControllerRef, period_divider: u32) -> Result<Self, MetaError> {
        let period_divider = if period_divider < 1 {
            error!("ThrottledController {}: period divider must be at least 1, using 1", name);
            1
        } else {
            period_divider
        };

        let id = next_meta_id();
        controller.claim(id)?;

        Ok(Self {
            id,
            name: name.to_string(),
            controller,
            period_divider,
            count: period_divider,
        })
    }

    pub fn period_divider(&self) -> u32 {
        self.period_divider
    }

    /// Change the divider. A divider below 1 is ignored.
    pub fn set_period_divider(&mut self, period_divider: u32) {
        if period_divider < 1 {
            warn!("ThrottledController {}: ignoring period divider {}", self.name, period_divider);
            return;
        }

        self.period_divider = period_divider;
        self.count = 0;
    }

    pub fn id(&self) -> MetaId {
        self.id
    }
}

impl Controller for ThrottledController {
    fn type_name(&self) -> &'static str {
        "ThrottledController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        self.count += 1;

        if self.count >= self.period_divider {
            execute_controller(&self.controller, io);
            self.count = 0;
        }
    }

    fn reset(&mut self) {
        reset_controller(&self.controller);
        self.count = self.period_divider;
    }

    fn dump(&self, depth: usize) -> String {
        format!(
            "{} 1/{}\n{}",
            dump_line(depth, &self.type_name().bold().to_string(), &self.name),
            self.period_divider,
            dump_controller(&self.controller, depth + 1)
        )
    }
}

impl Drop for ThrottledController {
    fn drop(&mut self) {
        self.controller.release(self.id);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctrl::{handle, test_utils::KeyWriter};

    #[test]
    fn test_throttling() {
        let inner = handle(KeyWriter::new("a", 1.0));
        let mut throttled = ThrottledController::new("pose_loop", inner.clone(), 3).unwrap();
        let mut io = ControllersIO::new();

        for _ in 0..7 {
            throttled.execute(&mut io);
        }
        // Periods 1, 4 and 7
        assert_eq!(inner.lock().unwrap().executions, 3);

        // A new divider restarts the count
        throttled.set_period_divider(2);
        throttled.execute(&mut io);
        assert_eq!(inner.lock().unwrap().executions, 3);
        throttled.execute(&mut io);
        assert_eq!(inner.lock().unwrap().executions, 4);

        throttled.set_period_divider(0);
        assert_eq!(throttled.period_divider(), 2);

        // After a reset the next period executes
        throttled.execute(&mut io);
        throttled.reset();
        throttled.execute(&mut io);
        assert_eq!(inner.lock().unwrap().executions, 5);
        assert_eq!(inner.lock().unwrap().resets, 1);
    }

    #[test]
    fn test_zero_divider_clamped() {
        let inner = handle(KeyWriter::new("a", 1.0));
        let mut throttled = ThrottledController::new("t", inner.clone(), 0).unwrap();
        let mut io = ControllersIO::new();

        throttled.execute(&mut io);
        throttled.execute(&mut io);
        assert_eq!(throttled.period_divider(), 1);
        assert_eq!(inner.lock().unwrap().executions, 2);
    }
}
