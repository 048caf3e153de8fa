//! # Path planner
//!
//! Follows a path of waypoints around the obstacles. Each step the planner checks the engine's
//! progress, rebuilds the avoidance route when the target changes or the line of sight to it is
//! lost, and hands the engine the next pose of the route.
//!
//! Waypoints to which no route can be found are marked unreachable and skipped. When no waypoint
//! of the path can be reached the robot is stopped.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, error, info, warn};
use serde::Deserialize;

use crate::{
    avoidance::Avoidance,
    engine::{EngineError, PlatformEngine},
    io::TargetPoseStatus,
    loc::Pose,
    path::{Path, PathError, PathPose},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Route poses closer than this to the robot are considered passed.
///
/// Units: millimeters
const ROUTE_POSE_TOLERANCE_MM: f64 = 1.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerParams {
    /// Units: milliseconds
    pub period_ms: u64,
}

pub struct Planner {
    params: PlannerParams,
    avoidance: Avoidance,
    path: Path,

    /// Index of the pose of the avoidance route being targeted
    avoidance_index: usize,

    /// The route must be rebuilt on the next step
    needs_update: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("No waypoint of the path can be reached")]
    NoReachableTarget,

    #[error("Path error: {0}")]
    PathError(#[from] PathError),

    #[error("Engine error: {0}")]
    EngineError(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PlannerParams {
    fn default() -> Self {
        Self { period_ms: 100 }
    }
}

impl Planner {
    pub fn new(params: PlannerParams, avoidance: Avoidance) -> Self {
        Self {
            params,
            avoidance,
            path: Path::default(),
            avoidance_index: 1,
            needs_update: true,
        }
    }

    pub fn params(&self) -> &PlannerParams {
        &self.params
    }

    pub fn avoidance(&self) -> &Avoidance {
        &self.avoidance
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the path and start following it.
    pub fn follow(&mut self, poses: Vec<PathPose>, play_in_loop: bool) -> Result<(), PlannerError> {
        self.path.load(poses)?;
        self.path.set_play_in_loop(play_in_loop);
        self.start();

        info!("Planner following a path of {} waypoints", self.path.len());
        Ok(())
    }

    pub fn start(&mut self) {
        self.path.start();
        self.needs_update = true;
    }

    pub fn stop(&mut self) {
        self.path.stop();
    }

    pub fn is_started(&self) -> bool {
        self.path.is_active()
    }

    /// Run one planning step against the engine.
    ///
    /// On error the engine has been stopped.
    pub fn step(&mut self, engine: &mut PlatformEngine) -> Result<(), PlannerError> {
        if !self.path.is_active() {
            return Ok(());
        }

        match self.route_update(engine) {
            Err(PlannerError::NoReachableTarget) => {
                error!("Planner: no reachable waypoint, stopping");
                self.path.stop();
                engine.stop()?;
                Err(PlannerError::NoReachableTarget)
            }
            r => r,
        }
    }

    fn route_update(&mut self, engine: &mut PlatformEngine) -> Result<(), PlannerError> {
        let robot = engine.pose();
        let to_reach = engine.target().pose;

        let mut current = self.current_waypoint()?;
        let mut update = self.needs_update || self.avoidance.check_recompute(&robot, &to_reach);

        // The engine status refers to the previous route until the first one is built
        let status = if self.needs_update {
            TargetPoseStatus::Moving
        }
        else {
            engine.pose_reached()
        };

        match status {
            TargetPoseStatus::Reached => {
                if same_position(&to_reach, &current.pose) {
                    debug!("Planner: waypoint {} reached", self.path.current_index());

                    if !self.path.advance() {
                        info!("Planner: path complete");
                        self.path.stop();
                        return Ok(());
                    }
                    current = self.current_waypoint()?;
                    update = true;
                }
                else {
                    debug!("Planner: intermediate pose {} reached", self.avoidance_index);
                    self.avoidance_index += 1;

                    let next = self.avoidance.get_pose(self.avoidance_index);
                    if self.avoidance.check_recompute(&robot, &next) {
                        debug!("Planner: line of sight lost, recomputing the route");
                        update = true;
                    }
                }
            }
            TargetPoseStatus::Blocked | TargetPoseStatus::Timeout => {
                warn!("Planner: robot {:?}, skipping waypoint", status);

                if !self.path.unreachable() {
                    return Err(PlannerError::NoReachableTarget);
                }
                current = self.current_waypoint()?;
                update = true;
            }
            _ => (),
        }

        if update {
            let mut attempts = self.path.len();

            while let Err(e) = self.avoidance.build_graph(&robot, &current.pose) {
                warn!("Planner: no route to waypoint {}: {}", self.path.current_index(), e);

                if attempts == 0 || !self.path.unreachable() {
                    return Err(PlannerError::NoReachableTarget);
                }
                attempts -= 1;

                current = self.current_waypoint()?;
            }

            self.avoidance_index = 1;
            self.needs_update = false;

            // Skip the route poses the robot is already on
            loop {
                let pose = self.avoidance.get_pose(self.avoidance_index);
                if same_position(&pose, &current.pose)
                    || (pose.coords() - robot.coords()).norm() >= ROUTE_POSE_TOLERANCE_MM
                {
                    break;
                }
                self.avoidance_index += 1;
            }
        }

        let next = self.avoidance.get_pose(self.avoidance_index);

        let target = if same_position(&next, &current.pose) {
            current
        }
        else {
            PathPose {
                pose: next,
                bypass_final_orientation: true,
                is_intermediate: true,
                ..current
            }
        };

        if engine.target() != &target || engine.is_halted() {
            debug!(
                "Planner: new target ({:.1}, {:.1}){}",
                target.pose.x,
                target.pose.y,
                if target.is_intermediate { " intermediate" } else { "" }
            );
            engine.set_target(target)?;
        }

        Ok(())
    }

    fn current_waypoint(&self) -> Result<PathPose, PlannerError> {
        self.path.current().cloned().ok_or(PlannerError::NoReachableTarget)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn same_position(a: &Pose, b: &Pose) -> bool {
    a.x == b.x && a.y == b.y
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ctrl::{handle, Controller},
        drive::DriveParams,
        engine::{EngineInput, EngineParams},
        io::ControllersIO,
        obstacles::{Obstacle, ObstacleList, ObstacleListParams, ObstacleRegistry, SharedObstacleList},
        sim::SimPlatform,
    };
    use nalgebra::Point2;
    use util::module::State;

    /// Reports every target as reached.
    struct Arrived;

    impl Controller for Arrived {
        fn type_name(&self) -> &'static str {
            "Arrived"
        }

        fn execute(&mut self, io: &mut ControllersIO) {
            io.write("pose_reached", TargetPoseStatus::Reached);
        }
    }

    fn setup() -> (Planner, PlatformEngine, SharedObstacleList) {
        let mut registry = ObstacleRegistry::new();
        let list = registry
            .register(ObstacleList::new(ObstacleListParams::default()).unwrap())
            .unwrap();

        let borders = vec![
            Point2::new(0.0, 0.0),
            Point2::new(3000.0, 0.0),
            Point2::new(3000.0, 2000.0),
            Point2::new(0.0, 2000.0),
        ];
        let planner = Planner::new(PlannerParams::default(), Avoidance::new(registry, borders).unwrap());

        let sim = SimPlatform::new(DriveParams::default(), Pose::new(500.0, 1000.0, 0.0)).unwrap();
        let engine = PlatformEngine::new(
            EngineParams::default(),
            Box::new(sim.localization),
            Box::new(sim.drive),
            Path::default().shared(),
        );

        (planner, engine, list)
    }

    /// Teleport the robot on its target and let the engine notice it.
    fn arrive(engine: &mut PlatformEngine) {
        engine.set_pose(engine.target().pose);
        engine.set_controller(handle(Arrived));
        engine.proc(&EngineInput::default()).unwrap();
        assert_eq!(engine.pose_reached(), TargetPoseStatus::Reached);
    }

    #[test]
    fn test_direct_target() {
        let (mut planner, mut engine, _) = setup();

        planner.follow(vec![PathPose::new(1500.0, 1000.0, 90.0)], false).unwrap();
        planner.step(&mut engine).unwrap();

        assert_eq!(engine.target(), &PathPose::new(1500.0, 1000.0, 90.0));
        assert_eq!(engine.pose_reached(), TargetPoseStatus::Moving);

        // Nothing changes while moving
        planner.step(&mut engine).unwrap();
        assert_eq!(engine.target().pose, Pose::new(1500.0, 1000.0, 90.0));

        arrive(&mut engine);
        planner.step(&mut engine).unwrap();
        assert!(!planner.is_started());
    }

    #[test]
    fn test_intermediate_poses() {
        let (mut planner, mut engine, list) = setup();
        list.lock().unwrap().push(Obstacle::circle(1000.0, 1000.0, 200.0).unwrap()).unwrap();

        planner.follow(vec![PathPose::new(1500.0, 1000.0, 0.0)], false).unwrap();
        planner.step(&mut engine).unwrap();

        // Goes around the obstacle first
        let first = engine.target().clone();
        assert!(first.is_intermediate);
        assert!(first.bypass_final_orientation);
        assert_eq!(first.pose, planner.avoidance().get_pose(1));

        arrive(&mut engine);
        planner.step(&mut engine).unwrap();

        let second = engine.target().clone();
        assert!(second.is_intermediate);
        assert_ne!(second.pose, first.pose);
        assert_eq!(engine.pose_reached(), TargetPoseStatus::Moving);

        // Last leg to the waypoint itself
        arrive(&mut engine);
        planner.step(&mut engine).unwrap();
        assert_eq!(engine.target(), &PathPose::new(1500.0, 1000.0, 0.0));
    }

    #[test]
    fn test_unreachable_waypoints() {
        let (mut planner, mut engine, list) = setup();
        list.lock().unwrap().push(Obstacle::circle(2000.0, 1000.0, 200.0).unwrap()).unwrap();

        // The first waypoint is inside the obstacle, the second one is reachable
        planner
            .follow(
                vec![PathPose::new(2000.0, 1000.0, 0.0), PathPose::new(1000.0, 500.0, 0.0)],
                false,
            )
            .unwrap();
        planner.step(&mut engine).unwrap();

        assert!(planner.path().poses()[0].unreachable);
        assert_eq!(planner.path().current_index(), 1);
        assert_eq!(engine.target().pose, Pose::new(1000.0, 500.0, 0.0));
    }

    #[test]
    fn test_no_reachable_target() {
        let (mut planner, mut engine, list) = setup();
        list.lock().unwrap().push(Obstacle::circle(2000.0, 1000.0, 200.0).unwrap()).unwrap();

        planner
            .follow(
                vec![PathPose::new(2000.0, 1000.0, 0.0), PathPose::new(4000.0, 500.0, 0.0)],
                false,
            )
            .unwrap();

        assert!(matches!(planner.step(&mut engine), Err(PlannerError::NoReachableTarget)));
        assert!(!planner.is_started());
        assert!(engine.is_halted());
    }
}
