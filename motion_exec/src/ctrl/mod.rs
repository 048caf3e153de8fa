//! # Controller composition
//!
//! A controller is a unit of the control pipeline: it reads its inputs from the shared
//! `ControllersIO`, computes, and writes its outputs back. Controllers are composed by meta
//! controllers into sequential chains, parallel fan-outs with key collision detection, periodic
//! (throttled) execution and runtime switches.
//!
//! Controllers live in `ControllerCell`s shared through `Arc`s, so that the code which builds a
//! chain can keep a typed handle on a stage (to reset it or read its state) after handing it to a
//! meta controller. A cell records which meta controller owns it: a controller belongs to at most
//! one composition at a time.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod meta;
mod reset;
mod switch;
mod throttled;

pub use meta::*;
pub use reset::*;
pub use switch::*;
pub use throttled::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, LockResult, Mutex, MutexGuard,
};
use log::error;

use crate::io::ControllersIO;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Owner id of a controller which isn't part of any composition.
const NO_OWNER: MetaId = 0;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static NEXT_META_ID: AtomicUsize = AtomicUsize::new(1);

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A stage of the control pipeline.
pub trait Controller: Send {
    /// Name of the controller type.
    fn type_name(&self) -> &'static str;

    /// Instance name, empty if none was given.
    fn name(&self) -> &str {
        ""
    }

    /// Run one period of the controller.
    fn execute(&mut self, io: &mut ControllersIO);

    /// Reset the internal state, e.g. on a new target.
    fn reset(&mut self) {}

    /// Render the controller (and its children for meta controllers) as an indented tree.
    fn dump(&self, depth: usize) -> String {
        dump_line(depth, self.type_name(), self.name())
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Identifier of a meta controller.
pub type MetaId = usize;

/// Shared, lockable storage of a controller.
pub struct ControllerCell<C: ?Sized> {
    owner: AtomicUsize,
    inner: Mutex<C>,
}

/// Typed handle on a controller.
pub type Handle<C> = Arc<ControllerCell<C>>;

/// Type-erased handle on a controller, as held by meta controllers.
pub type ControllerRef = Arc<ControllerCell<dyn Controller>>;

/// Does nothing. Fills the idle branch of a switch.
#[derive(Debug, Default)]
pub struct NoOpController;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised when building compositions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetaError {
    #[error("Meta controller is full ({0} controllers)")]
    CapacityExceeded(usize),

    #[error("Controller is already owned by meta controller {0}")]
    AlreadyOwned(MetaId),

    #[error("No controller at index {0}")]
    IndexOutOfRange(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Controller for NoOpController {
    fn type_name(&self) -> &'static str {
        "NoOpController"
    }

    fn execute(&mut self, _io: &mut ControllersIO) {}
}

impl<C: ?Sized> ControllerCell<C> {
    /// Lock the controller.
    pub fn lock(&self) -> LockResult<MutexGuard<'_, C>> {
        self.inner.lock()
    }

    /// The meta controller owning this controller, if any.
    pub fn owner(&self) -> Option<MetaId> {
        match self.owner.load(Ordering::Acquire) {
            NO_OWNER => None,
            id => Some(id),
        }
    }

    /// Take ownership on behalf of `meta`.
    pub(crate) fn claim(&self, meta: MetaId) -> Result<(), MetaError> {
        self.owner
            .compare_exchange(NO_OWNER, meta, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(MetaError::AlreadyOwned)
    }

    /// Give up ownership, only if `meta` is the current owner.
    pub(crate) fn release(&self, meta: MetaId) {
        let _ = self
            .owner
            .compare_exchange(meta, NO_OWNER, Ordering::AcqRel, Ordering::Acquire);
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Wrap a controller into a shareable handle.
pub fn handle<C: Controller + 'static>(controller: C) -> Handle<C> {
    Arc::new(ControllerCell {
        owner: AtomicUsize::new(NO_OWNER),
        inner: Mutex::new(controller),
    })
}

/// Execute a controller held by a meta controller.
///
/// A poisoned controller is reported and skipped so the rest of the chain still runs.
pub fn execute_controller(controller: &ControllerRef, io: &mut ControllersIO) {
    match controller.lock() {
        Ok(mut c) => c.execute(io),
        Err(_) => error!("Controller lock poisoned, skipping it this period"),
    }
}

/// Reset a controller held by a meta controller.
pub fn reset_controller(controller: &ControllerRef) {
    match controller.lock() {
        Ok(mut c) => c.reset(),
        Err(_) => error!("Controller lock poisoned, cannot reset it"),
    }
}

/// Render a controller held by a meta controller.
pub fn dump_controller(controller: &ControllerRef, depth: usize) -> String {
    match controller.lock() {
        Ok(c) => c.dump(depth),
        Err(_) => dump_line(depth, "<poisoned>", ""),
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

pub(crate) fn next_meta_id() -> MetaId {
    NEXT_META_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn dump_line(depth: usize, type_name: &str, name: &str) -> String {
    if name.is_empty() {
        format!("{:indent$}{}", "", type_name, indent = depth * 2)
    } else {
        format!("{:indent$}{} ({})", "", type_name, name, indent = depth * 2)
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    /// Test controller writing a constant to a key and counting its executions.
    pub struct KeyWriter {
        pub key: String,
        pub value: f64,
        pub executions: usize,
        pub resets: usize,
    }

    impl KeyWriter {
        pub fn new(key: &str, value: f64) -> Self {
            Self {
                key: key.to_string(),
                value,
                executions: 0,
                resets: 0,
            }
        }
    }

    impl Controller for KeyWriter {
        fn type_name(&self) -> &'static str {
            "KeyWriter"
        }

        fn execute(&mut self, io: &mut ControllersIO) {
            self.executions += 1;
            io.write(&self.key, self.value);
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::test_utils::KeyWriter;
    use super::*;

    #[test]
    fn test_ownership_handshake() {
        let ctrl = handle(KeyWriter::new("a", 1.0));
        assert_eq!(ctrl.owner(), None);

        ctrl.claim(3).unwrap();
        assert_eq!(ctrl.owner(), Some(3));
        assert_eq!(ctrl.claim(4), Err(MetaError::AlreadyOwned(3)));

        // Only the owner can release
        ctrl.release(4);
        assert_eq!(ctrl.owner(), Some(3));
        ctrl.release(3);
        assert_eq!(ctrl.owner(), None);
    }

    #[test]
    fn test_execute_through_ref() {
        let ctrl = handle(KeyWriter::new("a", 2.0));
        let erased: ControllerRef = ctrl.clone();
        let mut io = ControllersIO::new();

        execute_controller(&erased, &mut io);
        reset_controller(&erased);

        assert_eq!(io.get_as::<f64>("a"), Some(2.0));
        let w = ctrl.lock().unwrap();
        assert_eq!(w.executions, 1);
        assert_eq!(w.resets, 1);
    }
}
