//! Sequential and parallel meta controllers

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{trace, warn};
use owo_colors::OwoColorize;

use super::{
    dump_controller, dump_line, execute_controller, next_meta_id, reset_controller, Controller,
    ControllerRef, MetaError, MetaId,
};
use crate::io::{ControllersIO, KeyHash, KeySet};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Bounded, owned list of child controllers.
pub(crate) struct Children {
    id: MetaId,
    capacity: usize,
    controllers: Vec<ControllerRef>,
}

/// Executes its children one after the other on the same IO.
///
/// A child may ask for the whole chain to be reset through `ControllersIO::request_reset`, the
/// reset happens as soon as that child returns.
pub struct MetaController<const N: usize> {
    name: String,
    children: Children,
}

/// Executes its children in order, warning when two of them write the same key in one period.
///
/// Children of a parallel composition are expected to be independent: each one must own its
/// output keys. A collision is reported but doesn't stop the execution.
pub struct ParallelMetaController<const N: usize> {
    name: String,
    children: Children,
    last_collisions: Vec<KeyHash>,
}

/// Straight-line filter, path management and a parallel split into the two axes.
pub type QuadPidMetaController = MetaController<4>;

/// Pose PID, speed filter and speed PID of one axis.
pub type DualPidMetaController = MetaController<3>;

/// Parallel split into the linear and angular axes.
pub type PolarParallelMetaController = ParallelMetaController<2>;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Children {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            id: next_meta_id(),
            capacity,
            controllers: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn id(&self) -> MetaId {
        self.id
    }

    fn len(&self) -> usize {
        self.controllers.len()
    }

    fn check_capacity(&self) -> Result<(), MetaError> {
        if self.controllers.len() >= self.capacity {
            Err(MetaError::CapacityExceeded(self.capacity))
        } else {
            Ok(())
        }
    }

    fn add(&mut self, controller: ControllerRef) -> Result<(), MetaError> {
        self.check_capacity()?;
        controller.claim(self.id)?;
        self.controllers.push(controller);
        Ok(())
    }

    fn prepend(&mut self, controller: ControllerRef) -> Result<(), MetaError> {
        self.check_capacity()?;
        controller.claim(self.id)?;
        self.controllers.insert(0, controller);
        Ok(())
    }

    fn replace(
        &mut self,
        index: usize,
        controller: ControllerRef,
    ) -> Result<ControllerRef, MetaError> {
        if index >= self.controllers.len() {
            return Err(MetaError::IndexOutOfRange(index));
        }
        controller.claim(self.id)?;

        let old = std::mem::replace(&mut self.controllers[index], controller);
        old.release(self.id);

        Ok(old)
    }

    fn get(&self, index: usize) -> Option<&ControllerRef> {
        self.controllers.get(index)
    }

    fn reset(&self) {
        for c in self.controllers.iter() {
            reset_controller(c);
        }
    }

    fn dump(&self, depth: usize, type_name: &str, name: &str) -> String {
        let mut out = dump_line(depth, &type_name.bold().to_string(), name);
        for c in self.controllers.iter() {
            out.push('\n');
            out.push_str(&dump_controller(c, depth + 1));
        }
        out
    }
}

impl Drop for Children {
    fn drop(&mut self) {
        for c in self.controllers.iter() {
            c.release(self.id);
        }
    }
}

macro_rules! impl_chain_management {
    ($meta:ident) => {
        impl<const N: usize> $meta<N> {
            /// Append a controller to the chain.
            pub fn add_controller(&mut self, controller: ControllerRef) -> Result<(), MetaError> {
                self.children.add(controller)
            }

            /// Insert a controller at the front of the chain.
            pub fn prepend_controller(
                &mut self,
                controller: ControllerRef,
            ) -> Result<(), MetaError> {
                self.children.prepend(controller)
            }

            /// Replace the controller at `index`, returning the previous one (which is released).
            pub fn replace_controller(
                &mut self,
                index: usize,
                controller: ControllerRef,
            ) -> Result<ControllerRef, MetaError> {
                self.children.replace(index, controller)
            }

            /// Controller at `index`.
            pub fn controller(&self, index: usize) -> Option<&ControllerRef> {
                self.children.get(index)
            }

            /// Number of controllers in the chain.
            pub fn len(&self) -> usize {
                self.children.len()
            }

            pub fn is_empty(&self) -> bool {
                self.children.len() == 0
            }

            /// Identifier used for ownership of the children.
            pub fn id(&self) -> MetaId {
                self.children.id()
            }
        }
    };
}

impl_chain_management!(MetaController);
impl_chain_management!(ParallelMetaController);

impl<const N: usize> MetaController<N> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: Children::new(N),
        }
    }
}

impl<const N: usize> Controller for MetaController<N> {
    fn type_name(&self) -> &'static str {
        "MetaController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        trace!("Execute MetaController {}", self.name);

        for c in self.children.controllers.iter() {
            execute_controller(c, io);

            if io.take_reset_request() {
                trace!("MetaController {} reset requested", self.name);
                self.children.reset();
            }
        }
    }

    fn reset(&mut self) {
        self.children.reset();
    }

    fn dump(&self, depth: usize) -> String {
        self.children.dump(depth, self.type_name(), &self.name)
    }
}

impl<const N: usize> ParallelMetaController<N> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: Children::new(N),
            last_collisions: Vec::new(),
        }
    }

    /// Keys written by more than one child during the last execution.
    pub fn collisions(&self) -> &[KeyHash] {
        &self.last_collisions
    }
}

impl<const N: usize> Controller for ParallelMetaController<N> {
    fn type_name(&self) -> &'static str {
        "ParallelMetaController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        trace!("Execute ParallelMetaController {}", self.name);

        self.last_collisions.clear();

        // Each child's writes are collected on an empty set, the round's set is restored after
        let round = io.take_modified();
        let mut written = KeySet::new();

        for c in self.children.controllers.iter() {
            execute_controller(c, io);
            let just_written = io.take_modified();

            for key in ControllersIO::find_collisions(&just_written, &written) {
                warn!(
                    "ParallelMetaController {}: key \"{}\" written by more than one branch",
                    self.name,
                    io.key_name(key).unwrap_or("?")
                );
                self.last_collisions.push(key);
            }

            written.extend(just_written);
        }

        io.merge_modified(&round);
        io.merge_modified(&written);
    }

    fn reset(&mut self) {
        self.children.reset();
    }

    fn dump(&self, depth: usize) -> String {
        self.children.dump(depth, self.type_name(), &self.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctrl::{handle, test_utils::KeyWriter};
    use crate::io::hash_key;

    #[test]
    fn test_sequential_order() {
        let first = handle(KeyWriter::new("out", 1.0));
        let second = handle(KeyWriter::new("out", 2.0));

        let mut meta = MetaController::<2>::new("seq");
        meta.add_controller(second.clone()).unwrap();
        meta.prepend_controller(first.clone()).unwrap();

        let mut io = ControllersIO::new();
        meta.execute(&mut io);

        // The appended controller ran last
        assert_eq!(io.get_as::<f64>("out"), Some(2.0));
        assert_eq!(first.lock().unwrap().executions, 1);
        assert_eq!(second.lock().unwrap().executions, 1);
    }

    #[test]
    fn test_membership_errors() {
        let a = handle(KeyWriter::new("a", 1.0));
        let b = handle(KeyWriter::new("b", 1.0));
        let c = handle(KeyWriter::new("c", 1.0));

        let mut meta = MetaController::<2>::new("m");
        meta.add_controller(a.clone()).unwrap();
        assert_eq!(
            meta.add_controller(a.clone()),
            Err(MetaError::AlreadyOwned(meta.id()))
        );
        meta.add_controller(b.clone()).unwrap();
        assert_eq!(
            meta.add_controller(c.clone()),
            Err(MetaError::CapacityExceeded(2))
        );

        // A controller can't be shared with a second composition
        let mut other = ParallelMetaController::<2>::new("p");
        assert_eq!(
            other.add_controller(a.clone()),
            Err(MetaError::AlreadyOwned(meta.id()))
        );

        // Replacing releases the previous controller
        assert_eq!(
            meta.replace_controller(5, c.clone()).err(),
            Some(MetaError::IndexOutOfRange(5))
        );
        meta.replace_controller(0, c.clone()).unwrap();
        assert_eq!(a.owner(), None);
        assert_eq!(c.owner(), Some(meta.id()));
        other.add_controller(a.clone()).unwrap();

        // Dropping the meta controller releases its children
        drop(meta);
        assert_eq!(b.owner(), None);
        assert_eq!(c.owner(), None);
    }

    #[test]
    fn test_parallel_collision() {
        let lin = handle(KeyWriter::new("linear_speed_order", 1.0));
        let ang = handle(KeyWriter::new("angular_speed_order", 1.0));
        let bad = handle(KeyWriter::new("linear_speed_order", 5.0));

        let mut par = PolarParallelMetaController::new("independent");
        par.add_controller(lin).unwrap();
        par.add_controller(ang).unwrap();

        let mut io = ControllersIO::new();
        par.execute(&mut io);
        assert!(par.collisions().is_empty());

        let mut par = ParallelMetaController::<3>::new("colliding");
        par.add_controller(handle(KeyWriter::new("a", 0.0))).unwrap();
        par.add_controller(bad).unwrap();
        par.add_controller(handle(KeyWriter::new("b", 0.0))).unwrap();

        let mut io = ControllersIO::new();
        io.write("linear_speed_order", 0.0);
        io.clear_modified();
        par.execute(&mut io);
        assert!(par.collisions().is_empty());

        // Two branches writing the same key in the same round
        let mut par = ParallelMetaController::<2>::new("colliding");
        par.add_controller(handle(KeyWriter::new("x", 1.0))).unwrap();
        par.add_controller(handle(KeyWriter::new("x", 2.0))).unwrap();
        let mut io = ControllersIO::new();
        par.execute(&mut io);
        assert_eq!(par.collisions(), &[hash_key("x")]);
        // The collision is not fatal, the last writer wins
        assert_eq!(io.get_as::<f64>("x"), Some(2.0));

        // A key written before the parallel round is not a collision, and the round's writes
        // stay visible to whatever runs next
        let mut par = ParallelMetaController::<2>::new("after_write");
        par.add_controller(handle(KeyWriter::new("y", 1.0))).unwrap();
        par.add_controller(handle(KeyWriter::new("z", 1.0))).unwrap();
        let mut io = ControllersIO::new();
        io.write("y", 0.0);
        io.write("w", 0.0);
        par.execute(&mut io);
        assert!(par.collisions().is_empty());
        let modified = io.snapshot_modified();
        for key in ["w", "y", "z"].iter() {
            assert!(modified.contains(&hash_key(key)));
        }
    }

    struct ResetRequester;

    impl Controller for ResetRequester {
        fn type_name(&self) -> &'static str {
            "ResetRequester"
        }

        fn execute(&mut self, io: &mut ControllersIO) {
            io.request_reset();
        }
    }

    #[test]
    fn test_reset_request() {
        let before = handle(KeyWriter::new("a", 1.0));
        let after = handle(KeyWriter::new("b", 1.0));

        let mut meta = MetaController::<3>::new("m");
        meta.add_controller(before.clone()).unwrap();
        meta.add_controller(handle(ResetRequester)).unwrap();
        meta.add_controller(after.clone()).unwrap();

        let mut io = ControllersIO::new();
        meta.execute(&mut io);

        assert_eq!(before.lock().unwrap().resets, 1);
        assert_eq!(after.lock().unwrap().resets, 1);
        // Controllers after the requester still run in the same period
        assert_eq!(after.lock().unwrap().executions, 1);
        assert!(!io.take_reset_request());
    }

    #[test]
    fn test_dump() {
        let mut meta = MetaController::<2>::new("root");
        meta.add_controller(handle(KeyWriter::new("a", 1.0))).unwrap();

        let dump = meta.dump(0);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("MetaController"));
        assert_eq!(lines[1], "  KeyWriter");
    }
}
