//! # Controller chains
//!
//! Builders wiring the filters and controllers into the complete chains run by the engine. Each
//! chain is described by a parameter structure which can be loaded from TOML, and keeps handles
//! on the controllers the rest of the software needs to reach once the chain is built.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{error, info};
use serde::Deserialize;

use crate::{
    controllers::{
        AdaptivePurePursuitController, AntiBlockingController, AntiBlockingKeys, AntiBlockingParams,
        LogTelemetrySink, PosePidController, PosePidKeys, PurePursuitKeys, PurePursuitParams,
        SpeedPidController, SpeedPidKeys, TelemetryController, TelemetryKeys, TrackerCombinerController,
        TrackerCombinerKeys,
    },
    ctrl::{
        dump_controller, handle, ConditionalSwitchMetaController, ControllerRef, DualPidMetaController, Handle,
        MetaController, MetaError, NoOpController, PolarParallelMetaController, QuadPidMetaController,
        ThrottledController,
    },
    filters::{
        AccelerationFilter, AccelerationKeys, AccelerationParams, DecelerationFilter, DecelerationKeys,
        DecelerationParams, MotorPoseFilter, MotorPoseKeys, MotorPoseParams, PathManagerFilter,
        PathManagerKeys, PoseStraightFilter, PoseStraightKeys, PoseStraightParams, SpeedFilter,
        SpeedFilterKeys, SpeedFilterParams, SpeedLimitFilter, SpeedLimitKeys, SpeedLimitParams,
    },
    path::SharedPath,
    pid::PidParams,
    traj::{ProfileParams, ProfileTrackerController, ProfileTrackerKeys},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const AXES: [&str; 2] = ["linear", "angular"];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Per axis parameters of the four PID chain.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QuadPidAxisParams {
    pub pose_pid: PidParams,
    pub deceleration: DecelerationParams,
    pub speed_filter: SpeedFilterParams,
    pub anti_blocking: AntiBlockingParams,
    pub speed_pid: PidParams,
}

/// Classic chain: pose loops running slower than the speed loops.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuadPidChainParams {
    pub pose_straight: PoseStraightParams,

    /// The pose loops run once every `pose_loop_divider` periods
    pub pose_loop_divider: u32,

    pub linear: QuadPidAxisParams,
    pub angular: QuadPidAxisParams,
}

/// Per axis parameters of the profile tracker chain.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrackerAxisParams {
    pub profile: ProfileParams,

    /// Gains of the correction of the tracking error
    pub tracking_pid: PidParams,

    pub speed_limit: SpeedLimitParams,
    pub acceleration: AccelerationParams,
    pub anti_blocking: AntiBlockingParams,
    pub speed_pid: PidParams,
}

/// Chain following trapezoidal profiles with a feedback correction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerChainParams {
    pub pose_straight: PoseStraightParams,

    pub linear: TrackerAxisParams,
    pub angular: TrackerAxisParams,

    /// Telemetry is published every `telemetry_divider` periods, 0 disables it
    pub telemetry_divider: u64,
}

/// Single axis chain, for tuning an axis on its own.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DualPidChainParams {
    pub pose_pid: PidParams,
    pub speed_filter: SpeedFilterParams,
    pub speed_pid: PidParams,
}

/// Position chain of a single motor run by a `MotorEngine`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MotorChainParams {
    pub motor_pose: MotorPoseParams,
    pub pose_pid: PidParams,
    pub speed_filter: SpeedFilterParams,
    pub speed_pid: PidParams,
}

/// Speed loop of one axis behind the pure pursuit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpeedLoopParams {
    pub anti_blocking: AntiBlockingParams,
    pub speed_pid: PidParams,
}

/// Chain driving the whole path as one curve with an adaptive pure pursuit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PurePursuitChainParams {
    pub pure_pursuit: PurePursuitParams,

    /// Profile of the rotations on the spot, before and after the path
    pub rotation_profile: ProfileParams,

    /// Gains of the correction of the rotation tracking error
    pub rotation_pid: PidParams,

    pub linear: SpeedLoopParams,
    pub angular: SpeedLoopParams,

    /// Telemetry is published every `telemetry_divider` periods, 0 disables it
    pub telemetry_divider: u64,
}

/// A built chain.
pub struct Chain {
    /// Controller to hand to the engine
    pub root: ControllerRef,

    pub pose_straight: Option<Handle<PoseStraightFilter>>,
    pub path_manager: Option<Handle<PathManagerFilter>>,
    pub pure_pursuit: Option<Handle<AdaptivePurePursuitController>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Cannot assemble the chain: {0}")]
    MetaError(#[from] MetaError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for QuadPidChainParams {
    fn default() -> Self {
        Self {
            pose_straight: PoseStraightParams::default(),
            pose_loop_divider: 5,
            linear: QuadPidAxisParams::default(),
            angular: QuadPidAxisParams::default(),
        }
    }
}

impl QuadPidChainParams {
    fn axis(&self, axis: &str) -> &QuadPidAxisParams {
        match axis {
            "angular" => &self.angular,
            _ => &self.linear,
        }
    }
}

impl Default for TrackerChainParams {
    fn default() -> Self {
        Self {
            pose_straight: PoseStraightParams::default(),
            linear: TrackerAxisParams::default(),
            angular: TrackerAxisParams::default(),
            telemetry_divider: 1,
        }
    }
}

impl TrackerChainParams {
    fn axis(&self, axis: &str) -> &TrackerAxisParams {
        match axis {
            "angular" => &self.angular,
            _ => &self.linear,
        }
    }
}

impl PurePursuitChainParams {
    fn axis(&self, axis: &str) -> &SpeedLoopParams {
        match axis {
            "angular" => &self.angular,
            _ => &self.linear,
        }
    }
}

impl Chain {
    /// Stop the current move: the straight line state machine is forced to its final state.
    pub fn force_finished(&self) {
        if let Some(ref ps) = self.pose_straight {
            match ps.lock() {
                Ok(mut ps) => ps.force_finished_state(),
                Err(_) => error!("PoseStraightFilter lock poisoned, cannot finish the move"),
            }
        }
    }

    /// Render the controller tree.
    pub fn dump(&self) -> String {
        dump_controller(&self.root, 0)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Path manager, throttled pose loops, then the speed loops of both axes.
pub fn quadpid_chain(params: &QuadPidChainParams, path: SharedPath) -> Result<Chain, ChainError> {
    let path_manager = handle(PathManagerFilter::new("path", PathManagerKeys::default(), path));
    let pose_straight = handle(PoseStraightFilter::new(
        "pose_straight",
        PoseStraightKeys::default(),
        params.pose_straight.clone(),
    ));

    // Pose loops
    let mut pose_pids = PolarParallelMetaController::new("pose_pids");
    for &axis in AXES.iter() {
        pose_pids.add_controller(handle(PosePidController::new(
            axis,
            PosePidKeys::for_axis(axis),
            &params.axis(axis).pose_pid,
        )))?;
    }

    let mut pose_loop = QuadPidMetaController::new("pose_loop");
    pose_loop.add_controller(pose_straight.clone())?;
    for &axis in AXES.iter() {
        pose_loop.add_controller(handle(DecelerationFilter::new(
            axis,
            DecelerationKeys::for_axis(axis),
            params.axis(axis).deceleration.clone(),
        )))?;
    }
    pose_loop.add_controller(handle(pose_pids))?;

    // Speed loops
    let mut speed_loops = PolarParallelMetaController::new("speed_loops");
    for &axis in AXES.iter() {
        let p = params.axis(axis);

        let mut speed_loop = DualPidMetaController::new(axis);
        speed_loop.add_controller(handle(SpeedFilter::new(
            axis,
            SpeedFilterKeys::for_axis(axis),
            SpeedFilterParams {
                anti_blocking: false,
                ..p.speed_filter.clone()
            },
        )))?;
        speed_loop.add_controller(handle(AntiBlockingController::new(
            axis,
            AntiBlockingKeys::for_axis(axis),
            p.anti_blocking.clone(),
        )))?;
        speed_loop.add_controller(handle(SpeedPidController::new(
            axis,
            SpeedPidKeys::for_axis(axis),
            &p.speed_pid,
        )))?;
        speed_loops.add_controller(handle(speed_loop))?;
    }

    let mut root = MetaController::<3>::new("quadpid");
    root.add_controller(path_manager.clone())?;
    root.add_controller(handle(ThrottledController::new(
        "pose_loop",
        handle(pose_loop),
        params.pose_loop_divider,
    )?))?;
    root.add_controller(handle(speed_loops))?;

    finish(root, Some(pose_straight), Some(path_manager))
}

/// Path manager, straight line decomposition, then a profile tracker chain per axis.
pub fn quadpid_tracker_chain(params: &TrackerChainParams, path: SharedPath) -> Result<Chain, ChainError> {
    let path_manager = handle(PathManagerFilter::new("path", PathManagerKeys::default(), path));
    let pose_straight = handle(PoseStraightFilter::new(
        "pose_straight",
        PoseStraightKeys::default(),
        params.pose_straight.clone(),
    ));

    let mut axes = PolarParallelMetaController::new("axes");
    let mut anti_blocking = PolarParallelMetaController::new("anti_blocking");

    for &axis in AXES.iter() {
        let p = params.axis(axis);

        let mut tracker = MetaController::<6>::new(axis);
        tracker.add_controller(handle(ProfileTrackerController::new(
            axis,
            ProfileTrackerKeys::for_axis(axis),
            p.profile.clone(),
        )))?;
        tracker.add_controller(handle(PosePidController::new(
            axis,
            PosePidKeys::for_tracker(axis),
            &p.tracking_pid,
        )))?;
        tracker.add_controller(handle(TrackerCombinerController::new(
            axis,
            TrackerCombinerKeys::for_axis(axis),
        )))?;
        tracker.add_controller(handle(SpeedLimitFilter::new(
            axis,
            SpeedLimitKeys::for_axis(axis),
            p.speed_limit.clone(),
        )))?;
        tracker.add_controller(handle(AccelerationFilter::new(
            axis,
            AccelerationKeys::for_axis(axis),
            p.acceleration.clone(),
        )))?;
        tracker.add_controller(handle(SpeedPidController::new(
            axis,
            SpeedPidKeys::for_axis(axis),
            &p.speed_pid,
        )))?;
        axes.add_controller(handle(tracker))?;

        anti_blocking.add_controller(handle(AntiBlockingController::new(
            axis,
            AntiBlockingKeys::for_axis(axis),
            p.anti_blocking.clone(),
        )))?;
    }

    let mut root = MetaController::<5>::new("quadpid_tracker");
    root.add_controller(path_manager.clone())?;
    root.add_controller(pose_straight.clone())?;
    root.add_controller(handle(axes))?;
    root.add_controller(handle(anti_blocking))?;
    if params.telemetry_divider > 0 {
        root.add_controller(handle(TelemetryController::new(
            "telemetry",
            TelemetryKeys::default(),
            Box::new(LogTelemetrySink),
            params.telemetry_divider,
        )))?;
    }

    finish(root, Some(pose_straight), Some(path_manager))
}

/// Pure pursuit over the whole path, a pose loop switched in for the rotations on the spot, then
/// the speed loops of both axes.
pub fn pure_pursuit_chain(params: &PurePursuitChainParams, path: SharedPath) -> Result<Chain, ChainError> {
    let pure_pursuit = handle(AdaptivePurePursuitController::new(
        "pure_pursuit",
        PurePursuitKeys::default(),
        params.pure_pursuit.clone(),
        path,
    ));

    // Rotation pose loop, fed by the angular pose error of the pure pursuit
    let mut rotation = MetaController::<3>::new("rotation");
    rotation.add_controller(handle(ProfileTrackerController::new(
        "angular",
        ProfileTrackerKeys {
            target_speed: None,
            ..ProfileTrackerKeys::for_axis("angular")
        },
        params.rotation_profile.clone(),
    )))?;
    rotation.add_controller(handle(PosePidController::new(
        "angular",
        PosePidKeys::for_tracker("angular"),
        &params.rotation_pid,
    )))?;
    rotation.add_controller(handle(TrackerCombinerController::new(
        "angular",
        TrackerCombinerKeys::for_axis("angular"),
    )))?;

    let rotating_in_place = ConditionalSwitchMetaController::new(
        "rotating_in_place",
        "rotating_in_place",
        handle(rotation),
        handle(NoOpController),
    )?;

    let mut speed_loops = PolarParallelMetaController::new("speed_loops");
    for &axis in AXES.iter() {
        let p = params.axis(axis);

        let mut speed_loop = MetaController::<2>::new(axis);
        speed_loop.add_controller(handle(AntiBlockingController::new(
            axis,
            AntiBlockingKeys::for_axis(axis),
            p.anti_blocking.clone(),
        )))?;
        speed_loop.add_controller(handle(SpeedPidController::new(
            axis,
            SpeedPidKeys::for_axis(axis),
            &p.speed_pid,
        )))?;
        speed_loops.add_controller(handle(speed_loop))?;
    }

    let mut root = MetaController::<4>::new("pure_pursuit");
    root.add_controller(pure_pursuit.clone())?;
    root.add_controller(handle(rotating_in_place))?;
    root.add_controller(handle(speed_loops))?;
    if params.telemetry_divider > 0 {
        root.add_controller(handle(TelemetryController::new(
            "telemetry",
            TelemetryKeys::default(),
            Box::new(LogTelemetrySink),
            params.telemetry_divider,
        )))?;
    }

    let mut chain = finish(root, None, None)?;
    chain.pure_pursuit = Some(pure_pursuit);
    Ok(chain)
}

/// Pose loop, speed filter and speed loop of a single axis.
///
/// The pose error of the axis is expected in the IO, e.g. from a `PoseErrorFilter`.
pub fn dualpid_chain(axis: &str, params: &DualPidChainParams) -> Result<Chain, ChainError> {
    let mut root = DualPidMetaController::new(axis);
    root.add_controller(handle(PosePidController::new(
        axis,
        PosePidKeys::for_axis(axis),
        &params.pose_pid,
    )))?;
    root.add_controller(handle(SpeedFilter::new(
        axis,
        SpeedFilterKeys::for_axis(axis),
        params.speed_filter.clone(),
    )))?;
    root.add_controller(handle(SpeedPidController::new(
        axis,
        SpeedPidKeys::for_axis(axis),
        &params.speed_pid,
    )))?;

    finish(root, None, None)
}

/// Position filter, pose loop, speed filter and speed loop of motor `motor`.
///
/// The keys are those published by a `MotorEngine` of the same name. The speed filter is capped
/// by the target speed the position filter lowers when braking, and reports stalls into the
/// motor's own `pose_reached`.
pub fn motor_chain(motor: &str, params: &MotorChainParams) -> Result<Chain, ChainError> {
    let pose_keys = MotorPoseKeys::for_motor(motor);
    let speed_filter_keys = SpeedFilterKeys {
        target_speed: pose_keys.filtered_speed.clone(),
        speed_filter_flag: pose_keys.speed_filter_flag.clone(),
        pose_reached: pose_keys.pose_reached.clone(),
        ..SpeedFilterKeys::for_axis(motor)
    };

    let mut root = MetaController::<4>::new(motor);
    root.add_controller(handle(MotorPoseFilter::new(
        motor,
        pose_keys,
        params.motor_pose.clone(),
    )))?;
    root.add_controller(handle(PosePidController::new(
        motor,
        PosePidKeys::for_axis(motor),
        &params.pose_pid,
    )))?;
    root.add_controller(handle(SpeedFilter::new(
        motor,
        speed_filter_keys,
        params.speed_filter.clone(),
    )))?;
    root.add_controller(handle(SpeedPidController::new(
        motor,
        SpeedPidKeys::for_axis(motor),
        &params.speed_pid,
    )))?;

    finish(root, None, None)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn finish<C: crate::ctrl::Controller + 'static>(
    root: C,
    pose_straight: Option<Handle<PoseStraightFilter>>,
    path_manager: Option<Handle<PathManagerFilter>>,
) -> Result<Chain, ChainError> {
    let root: ControllerRef = handle(root);
    info!("Chain built:\n{}", dump_controller(&root, 1));

    Ok(Chain {
        root,
        pose_straight,
        path_manager,
        pure_pursuit: None,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        drive::DriveParams,
        engine::{EngineInput, EngineParams, PlatformEngine, KEY_LINEAR_SPEED_COMMAND},
        filters::PoseStraightState,
        io::TargetPoseStatus,
        loc::Pose,
        path::{Path, PathPose},
        sim::SimPlatform,
    };
    use util::module::State;

    /// Speed loops following their order exactly on the simulated robot.
    fn exact_speed_pid() -> PidParams {
        PidParams {
            kp: 0.0,
            ki: 1.0,
            ..Default::default()
        }
    }

    fn sim_engine(chain: &Chain, path: SharedPath) -> PlatformEngine {
        let sim = SimPlatform::new(DriveParams::default(), Pose::default()).unwrap();
        let mut engine = PlatformEngine::new(
            EngineParams::default(),
            Box::new(sim.localization),
            Box::new(sim.drive),
            path,
        );
        engine.set_controller(chain.root.clone());
        engine
    }

    fn tracker_params() -> TrackerChainParams {
        let axis = TrackerAxisParams {
            tracking_pid: PidParams {
                kp: 0.1,
                ..Default::default()
            },
            speed_pid: exact_speed_pid(),
            ..Default::default()
        };

        TrackerChainParams {
            linear: axis.clone(),
            angular: axis,
            telemetry_divider: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_tracker_chain_straight_move() {
        let path = Path::default().shared();
        let chain = quadpid_tracker_chain(&tracker_params(), path.clone()).unwrap();
        let mut engine = sim_engine(&chain, path);

        engine.set_target(PathPose::new(1000.0, 0.0, 0.0)).unwrap();

        let mut velocities = Vec::new();
        let mut reached_at = None;
        for period in 0..150 {
            engine.proc(&EngineInput::default()).unwrap();
            velocities.push(engine.io().get_or("linear_tracker_velocity", f64::NAN));

            if engine.pose_reached() == TargetPoseStatus::Reached {
                reached_at = Some(period);
                break;
            }
        }

        let reached_at = reached_at.expect("target not reached within 150 periods");
        assert!(reached_at > 100);

        // Accelerate from rest, cruise at the maximum speed, stop at the end
        assert_eq!(velocities[0], 0.0);
        assert!(velocities.iter().any(|v| (v - 10.0).abs() < 1e-9));
        assert!(velocities.iter().all(|v| *v <= 10.0 + 1e-9));
        assert_eq!(*velocities.last().unwrap(), 0.0);

        let pose = engine.pose();
        assert!((1000.0 - pose.x).abs() < 1.0);
        assert!(pose.y.abs() < 1e-6);
        assert_eq!(chain.pose_straight.as_ref().unwrap().lock().unwrap().state(), PoseStraightState::Finished);

        // Comes to rest
        engine.proc(&EngineInput::default()).unwrap();
        engine.proc(&EngineInput::default()).unwrap();
        assert!(engine.io().get_or(KEY_LINEAR_SPEED_COMMAND, 1.0f64).abs() < 1e-9);
    }

    #[test]
    fn test_tracker_chain_follows_path() {
        let path = Path::default().shared();
        let chain = quadpid_tracker_chain(&tracker_params(), path.clone()).unwrap();
        let mut engine = sim_engine(&chain, path.clone());

        engine
            .follow_path(
                vec![PathPose::new(200.0, 0.0, 0.0).intermediate(), PathPose::new(400.0, 0.0, 0.0)],
                false,
            )
            .unwrap();

        // The intermediate waypoint is reported reached for a period before the path advances
        for _ in 0..300 {
            engine.proc(&EngineInput::default()).unwrap();
            if engine.pose_reached() == TargetPoseStatus::Reached && !path.lock().unwrap().is_active() {
                break;
            }
        }

        assert_eq!(engine.pose_reached(), TargetPoseStatus::Reached);
        assert!((engine.pose().x - 400.0).abs() < 2.0);
        assert!(!path.lock().unwrap().is_active());
    }

    #[test]
    fn test_motor_chain_keys() {
        let chain = motor_chain("lift", &MotorChainParams::default()).unwrap();
        let dump = chain.dump();
        assert!(dump.contains("MotorPoseFilter"));
        assert!(dump.contains("SpeedFilter"));

        let mut io = crate::io::ControllersIO::new();
        io.write("lift_current_pose", 0.0);
        io.write("lift_target_pose", 0.5);
        io.write("lift_current_speed", 0.0);
        io.write("lift_target_speed", 5.0);
        crate::ctrl::execute_controller(&chain.root, &mut io);

        // Within the threshold: reached, and the speed filter holds the motor still
        assert_eq!(io.get_as::<TargetPoseStatus>("lift_pose_reached"), Some(TargetPoseStatus::Reached));
        assert_eq!(io.get_as::<f64>("lift_speed_order"), Some(0.0));
        assert_eq!(io.get_as::<f64>("lift_speed_command"), Some(0.0));
        assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), None);
    }

    #[test]
    fn test_pure_pursuit_chain_follows_path() {
        let speed_loop = SpeedLoopParams {
            speed_pid: exact_speed_pid(),
            ..Default::default()
        };
        let params = PurePursuitChainParams {
            rotation_pid: PidParams {
                kp: 0.1,
                ..Default::default()
            },
            linear: speed_loop.clone(),
            angular: speed_loop,
            ..Default::default()
        };

        let path = Path::default().shared();
        let chain = pure_pursuit_chain(&params, path.clone()).unwrap();
        let mut engine = sim_engine(&chain, path.clone());

        let dump = chain.dump();
        assert!(dump.contains("AdaptivePurePursuitController"));
        assert!(dump.contains("NoOpController"));
        assert!(chain.pose_straight.is_none());

        // Around a corner, without stopping on the intermediate waypoint
        engine
            .follow_path(
                vec![PathPose::new(300.0, 0.0, 0.0).intermediate(), PathPose::new(300.0, 300.0, 90.0)],
                false,
            )
            .unwrap();

        let mut reached_at = None;
        let mut max_speed: f64 = 0.0;
        for period in 0..1000 {
            engine.proc(&EngineInput::default()).unwrap();
            max_speed = max_speed.max(engine.io().get_or("linear_current_speed", 0.0f64));

            if engine.pose_reached() == TargetPoseStatus::Reached {
                reached_at = Some(period);
                break;
            }
        }

        assert!(reached_at.is_some(), "path not completed within 1000 periods");
        assert!(max_speed > 1.0 && max_speed <= 10.0 + 1e-9, "{}", max_speed);
        assert!(!path.lock().unwrap().is_active());

        let pose = engine.pose();
        assert!((pose.x - 300.0).hypot(pose.y - 300.0) < 12.0, "{:?}", pose);
        assert!((pose.o - 90.0).abs() < 2.0, "{:?}", pose);

        let pp = chain.pure_pursuit.as_ref().unwrap();
        assert_eq!(pp.lock().unwrap().state(), crate::controllers::PurePursuitState::RotatingToFinal);
        assert_eq!(pp.lock().unwrap().segment_index(), 1);
    }

    #[test]
    fn test_quadpid_chain() {
        let axis = QuadPidAxisParams {
            pose_pid: PidParams {
                kp: 0.5,
                ..Default::default()
            },
            speed_pid: exact_speed_pid(),
            ..Default::default()
        };
        let params = QuadPidChainParams {
            linear: axis.clone(),
            angular: axis,
            ..Default::default()
        };

        let path = Path::default().shared();
        let chain = quadpid_chain(&params, path.clone()).unwrap();
        let mut engine = sim_engine(&chain, path);

        let dump = chain.dump();
        assert!(dump.contains("ThrottledController"));
        assert!(dump.contains("PoseStraightFilter"));
        assert!(dump.contains("SpeedPIDController"));

        engine.set_target(PathPose::new(300.0, 0.0, 0.0)).unwrap();
        for _ in 0..20 {
            engine.proc(&EngineInput::default()).unwrap();
        }

        let pose = engine.pose();
        assert!(pose.x > 10.0);
        assert!(pose.x < 300.0);
        assert_eq!(engine.pose_reached(), TargetPoseStatus::Moving);

        chain.force_finished();
        assert_eq!(chain.pose_straight.as_ref().unwrap().lock().unwrap().state(), PoseStraightState::Finished);
    }

    #[test]
    fn test_dualpid_chain() {
        let chain = dualpid_chain(
            "angular",
            &DualPidChainParams {
                pose_pid: PidParams {
                    kp: 1.0,
                    ..Default::default()
                },
                speed_pid: exact_speed_pid(),
                ..Default::default()
            },
        )
        .unwrap();

        let mut io = crate::io::ControllersIO::new();
        io.write("angular_pose_error", 90.0);
        io.write("angular_current_speed", 0.0);
        io.write("angular_target_speed", 5.0);
        io.write("angular_speed_filter_flag", false);

        crate::ctrl::execute_controller(&chain.root, &mut io);

        // Pose order capped by the speed filter acceleration, then followed by the speed loop
        assert!((io.get_or("angular_speed_order", 0.0f64) - 1.0).abs() < 1e-9);
        assert!((io.get_or("angular_speed_command", 0.0f64) - 1.0).abs() < 1e-9);
        assert!(chain.pose_straight.is_none());
    }

    #[test]
    fn test_params_from_toml() {
        let params: TrackerChainParams = util::params::from_str(
            r#"
            telemetry_divider = 10

            [pose_straight]
            linear_threshold = 2.0

            [linear.profile]
            max_speed = 8.0

            [linear.tracking_pid]
            kp = 0.2
            "#,
        )
        .unwrap();

        assert_eq!(params.telemetry_divider, 10);
        assert_eq!(params.pose_straight.linear_threshold, 2.0);
        assert_eq!(params.linear.profile.max_speed, 8.0);
        assert_eq!(params.linear.tracking_pid.kp, 0.2);
        assert_eq!(params.angular.profile.max_speed, ProfileParams::default().max_speed);

        let quad: QuadPidChainParams = util::params::from_str("pose_loop_divider = 2").unwrap();
        assert_eq!(quad.pose_loop_divider, 2);

        let pp: PurePursuitChainParams = util::params::from_str(
            r#"
            [pure_pursuit]
            max_lookahead_distance = 250.0

            [angular.speed_pid]
            kp = 0.3
            "#,
        )
        .unwrap();
        assert_eq!(pp.pure_pursuit.max_lookahead_distance, 250.0);
        assert_eq!(pp.pure_pursuit.min_lookahead_distance, 100.0);
        assert_eq!(pp.angular.speed_pid.kp, 0.3);
        assert_eq!(pp.telemetry_divider, 0);
    }

    #[test]
    fn test_shipped_params() {
        let quad: QuadPidChainParams =
            util::params::from_str(include_str!("../../params/quadpid.toml")).unwrap();
        assert_eq!(quad.pose_loop_divider, 5);
        assert!(quadpid_chain(&quad, Path::default().shared()).is_ok());

        let tracker: TrackerChainParams =
            util::params::from_str(include_str!("../../params/quadpid_tracker.toml")).unwrap();
        assert_eq!(tracker.telemetry_divider, 10);
        assert!(quadpid_tracker_chain(&tracker, Path::default().shared()).is_ok());

        let pp: PurePursuitChainParams =
            util::params::from_str(include_str!("../../params/pure_pursuit.toml")).unwrap();
        assert_eq!(pp.pure_pursuit.lookahead_speed_ratio, 10.0);
        assert!(pure_pursuit_chain(&pp, Path::default().shared()).is_ok());
    }
}
