//! Implementations for the PlatformEngine state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, trace, warn};
use serde::Serialize;

// Internal
use super::{EngineError, EngineParams};
use crate::{
    ctrl::{execute_controller, reset_controller, ControllerRef},
    drive::DriveController,
    io::{ControllersIO, TargetPoseStatus},
    loc::{Localization, Polar, Pose},
    path::{PathPose, SharedPath},
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

pub const KEY_CURRENT_POSE_X: &str = "current_pose_x";
pub const KEY_CURRENT_POSE_Y: &str = "current_pose_y";
pub const KEY_CURRENT_POSE_O: &str = "current_pose_O";
pub const KEY_CURRENT_LINEAR_SPEED: &str = "current_linear_speed";
pub const KEY_CURRENT_ANGULAR_SPEED: &str = "current_angular_speed";
pub const KEY_TARGET_POSE_X: &str = "target_pose_x";
pub const KEY_TARGET_POSE_Y: &str = "target_pose_y";
pub const KEY_TARGET_POSE_O: &str = "target_pose_O";
pub const KEY_TARGET_LINEAR_SPEED: &str = "target_linear_speed";
pub const KEY_TARGET_ANGULAR_SPEED: &str = "target_angular_speed";
pub const KEY_MOTION_DIRECTION: &str = "motion_direction";
pub const KEY_BYPASS_FINAL_ORIENTATION: &str = "bypass_final_orientation";
pub const KEY_BYPASS_ANTI_BLOCKING: &str = "bypass_anti_blocking";
pub const KEY_IS_INTERMEDIATE: &str = "is_intermediate";
pub const KEY_PATH_COMPLETE: &str = "path_complete";
pub const KEY_POSE_REACHED: &str = "pose_reached";
pub const KEY_LINEAR_SPEED_COMMAND: &str = "linear_speed_command";
pub const KEY_ANGULAR_SPEED_COMMAND: &str = "angular_speed_command";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Called whenever the target status changes to something other than `Moving`.
pub type PoseReachedCallback = Box<dyn FnMut(TargetPoseStatus) + Send>;

/// Platform engine module state
pub struct PlatformEngine {
    params: EngineParams,

    io: ControllersIO,
    controller: Option<ControllerRef>,
    localization: Box<dyn Localization>,
    drive: Box<dyn DriveController>,
    path: SharedPath,

    /// Target when no path is followed, else the current waypoint
    target: PathPose,
    pose_reached: TargetPoseStatus,
    pose_reached_cb: Option<PoseReachedCallback>,

    enabled: bool,

    /// Set by a stop, a stall or a timeout, cleared by the next target
    halted: bool,

    timeout_cycles: Option<u32>,
    target_cycles: u32,

    last_path_index: Option<usize>,
    warned_no_controller: bool,

    pub(crate) report: StatusReport,
    output: EngineOutput,
    arch: Option<Archiver>,
}

/// Input data to the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineInput {
    /// New single target, or `None` to carry on with the current one
    pub target: Option<PathPose>,
}

/// Result of one period.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EngineOutput {
    pub pose: Pose,

    /// Command sent to the drive.
    ///
    /// Units: millimeters/period, degrees/period
    pub command: Polar,

    pub pose_reached: TargetPoseStatus,
}

/// Status report for one period.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub cycle: u64,
    pub no_controller: bool,
    pub disabled: bool,
    pub halted: bool,
    pub timed_out: bool,
    pub path_index: Option<usize>,
}

/// Row of the engine archive.
#[derive(Serialize)]
struct EngineRecord {
    cycle: u64,
    x: f64,
    y: f64,
    o: f64,
    linear_command: f64,
    angular_command: f64,
    pose_reached: TargetPoseStatus,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for PlatformEngine {
    const NAME: &'static str = "engine";

    type InitData = &'static str;

    type Input = EngineInput;
    type Output = EngineOutput;
    type Status = StatusReport;

    type Error = EngineError;

    /// Initialise the engine.
    ///
    /// Expected init data is the path to the parameter file.
    fn init(&mut self, init_data: Self::InitData, session: &Session) -> Result<(), Self::Error> {
        self.params = params::load(init_data)?;

        if self.params.archive {
            let mut arch = Archiver::from_path(session, format!("{0}/{0}.csv", Self::NAME))?;
            arch.write_header(&[
                "cycle",
                "x",
                "y",
                "o",
                "linear_command",
                "angular_command",
                "pose_reached",
            ])?;
            self.arch = Some(arch);
        }

        info!("{} initialised with a {} ms period", Self::NAME, self.params.period_ms);

        Ok(())
    }

    /// Run one control period.
    fn proc(&mut self, input_data: &Self::Input) -> Result<(Self::Output, Self::Status), Self::Error> {
        self.report = StatusReport {
            cycle: self.report.cycle + 1,
            ..Default::default()
        };

        if let Some(ref target) = input_data.target {
            self.set_target(target.clone())?;
        }

        self.localization.update();
        let pose = self.localization.pose();
        let speed = self.localization.delta_polar_pose();

        let controller = match self.controller {
            Some(ref c) if self.enabled && !self.halted => c.clone(),
            _ => {
                if self.controller.is_none() && !self.warned_no_controller {
                    warn!("No controller attached to the engine, commanding zero speed");
                    self.warned_no_controller = true;
                }
                self.report.no_controller = self.controller.is_none();
                self.report.disabled = !self.enabled;
                self.report.halted = self.halted;
                self.drive.set_polar_velocity(Polar::default());

                self.output = EngineOutput {
                    pose,
                    command: Polar::default(),
                    pose_reached: self.pose_reached,
                };
                return Ok((self.output, self.report));
            }
        };

        self.prepare_inputs(pose, speed)?;

        execute_controller(&controller, &mut self.io);
        if self.io.take_reset_request() {
            reset_controller(&controller);
        }

        let command = self.process_outputs()?;

        self.output = EngineOutput {
            pose,
            command,
            pose_reached: self.pose_reached,
        };
        Ok((self.output, self.report))
    }
}

impl Archived for PlatformEngine {
    fn write(&mut self) -> Result<(), ArchiveError> {
        let record = EngineRecord {
            cycle: self.report.cycle,
            x: self.output.pose.x,
            y: self.output.pose.y,
            o: self.output.pose.o,
            linear_command: self.output.command.distance,
            angular_command: self.output.command.angle,
            pose_reached: self.output.pose_reached,
        };

        match self.arch {
            Some(ref mut a) => a.serialise(record),
            None => Ok(()),
        }
    }
}

impl PlatformEngine {
    pub fn new(
        params: EngineParams,
        localization: Box<dyn Localization>,
        drive: Box<dyn DriveController>,
        path: SharedPath,
    ) -> Self {
        let pose = localization.pose();

        Self {
            params,
            io: ControllersIO::new(),
            controller: None,
            localization,
            drive,
            path,
            target: PathPose::new(pose.x, pose.y, pose.o),
            pose_reached: TargetPoseStatus::Reached,
            pose_reached_cb: None,
            enabled: true,
            halted: false,
            timeout_cycles: None,
            target_cycles: 0,
            last_path_index: None,
            warned_no_controller: false,
            report: StatusReport::default(),
            output: EngineOutput::default(),
            arch: None,
        }
    }

    /// Attach the root controller, resetting it.
    pub fn set_controller(&mut self, controller: ControllerRef) {
        reset_controller(&controller);
        info!("Engine controller:\n{}", crate::ctrl::dump_controller(&controller, 1));
        self.controller = Some(controller);
        self.warned_no_controller = false;
    }

    pub fn set_pose_reached_cb(&mut self, cb: PoseReachedCallback) {
        self.pose_reached_cb = Some(cb);
    }

    /// Move to a single target, abandoning any path.
    pub fn set_target(&mut self, target: PathPose) -> Result<(), EngineError> {
        self.path.lock().map_err(|_| EngineError::PathPoisoned)?.stop();

        debug!("New target {:?}", target.pose);
        self.target = target;
        self.new_target();
        Ok(())
    }

    /// Follow a path from its first waypoint.
    pub fn follow_path(&mut self, poses: Vec<PathPose>, play_in_loop: bool) -> Result<(), EngineError> {
        {
            let mut path = self.path.lock().map_err(|_| EngineError::PathPoisoned)?;
            path.load(poses)?;
            path.set_play_in_loop(play_in_loop);
            path.start();

            match path.current() {
                Some(first) => self.target = first.clone(),
                None => {
                    warn!("Empty path, nothing to follow");
                    path.stop();
                    return Ok(());
                }
            }
            info!("Following a path of {} waypoints", path.len());
        }

        self.new_target();
        Ok(())
    }

    /// Stop on the spot.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        self.path.lock().map_err(|_| EngineError::PathPoisoned)?.stop();

        let pose = self.localization.pose();
        self.target.pose = pose;
        self.halted = true;
        self.drive.stop();

        info!("Engine stopped at ({:.1}, {:.1}, {:.1})", pose.x, pose.y, pose.o);
        Ok(())
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Disable the control, the drive is commanded to zero until enabled again.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn pose(&self) -> Pose {
        self.localization.pose()
    }

    /// Overwrite the localisation pose.
    pub fn set_pose(&mut self, pose: Pose) {
        self.localization.set_pose(pose);
    }

    pub fn target(&self) -> &PathPose {
        &self.target
    }

    pub fn pose_reached(&self) -> TargetPoseStatus {
        self.pose_reached
    }

    pub fn path(&self) -> &SharedPath {
        &self.path
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn io(&self) -> &ControllersIO {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut ControllersIO {
        &mut self.io
    }

    pub fn drive(&self) -> &dyn DriveController {
        self.drive.as_ref()
    }

    fn new_target(&mut self) {
        self.pose_reached = TargetPoseStatus::Moving;
        self.halted = false;
        self.target_cycles = 0;
        self.last_path_index = None;

        let timeout_ms = if self.target.timeout_ms > 0 {
            self.target.timeout_ms
        }
        else {
            self.params.default_timeout_ms
        };
        self.timeout_cycles = if self.params.timeout_enabled && timeout_ms > 0 {
            Some(self.params.ms_to_cycles(timeout_ms))
        }
        else {
            None
        };

        if let Some(ref c) = self.controller {
            reset_controller(c);
        }
    }

    fn write_readonly<V: Into<crate::io::Value>>(&mut self, key: &str, value: V) {
        self.io.write(key, value);
        if let Err(e) = self.io.mark_readonly(key) {
            error!("Cannot protect {}: {}", key, e);
        }
    }

    /// Publish the robot state and the target.
    fn prepare_inputs(&mut self, pose: Pose, speed: Polar) -> Result<(), EngineError> {
        self.io.reset_readonly_markers();
        self.io.clear_modified();

        self.write_readonly(KEY_CURRENT_POSE_X, pose.x);
        self.write_readonly(KEY_CURRENT_POSE_Y, pose.y);
        self.write_readonly(KEY_CURRENT_POSE_O, pose.o);
        self.write_readonly(KEY_CURRENT_LINEAR_SPEED, speed.distance);
        self.write_readonly(KEY_CURRENT_ANGULAR_SPEED, speed.angle);

        let path_active = self.path.lock().map_err(|_| EngineError::PathPoisoned)?.is_active();

        // The path manager publishes the waypoints itself
        if !path_active {
            let t = &self.target;
            let values = [
                (KEY_TARGET_POSE_X, t.pose.x),
                (KEY_TARGET_POSE_Y, t.pose.y),
                (KEY_TARGET_POSE_O, t.pose.o),
            ];
            let motion_direction = t.motion_direction.as_i32();
            let bypass_final = t.bypass_final_orientation;

            for (k, v) in values.iter() {
                self.io.write(k, *v);
            }
            self.io.write(KEY_MOTION_DIRECTION, motion_direction);
            self.io.write(KEY_BYPASS_FINAL_ORIENTATION, bypass_final);
            self.io.write(KEY_IS_INTERMEDIATE, false);
        }

        self.io.write(KEY_TARGET_LINEAR_SPEED, self.params.max_linear_speed * self.target.max_speed_ratio_linear);
        self.io.write(KEY_TARGET_ANGULAR_SPEED, self.params.max_angular_speed * self.target.max_speed_ratio_angular);
        self.io.write(KEY_BYPASS_ANTI_BLOCKING, self.target.bypass_anti_blocking);
        self.io.write(KEY_PATH_COMPLETE, false);
        self.io.write(KEY_POSE_REACHED, self.pose_reached);
        self.io.write(KEY_LINEAR_SPEED_COMMAND, 0.0);
        self.io.write(KEY_ANGULAR_SPEED_COMMAND, 0.0);

        trace!("Engine inputs: pose {:?}, speed {:?}, path active {}", pose, speed, path_active);
        Ok(())
    }

    /// Read the chain results, update the target status and command the drive.
    fn process_outputs(&mut self) -> Result<Polar, EngineError> {
        let mut intermediate_reached = false;
        {
            let path = self.path.lock().map_err(|_| EngineError::PathPoisoned)?;

            if path.is_active() {
                if let Some(waypoint) = path.current() {
                    self.target = waypoint.clone();
                }

                let index = path.current_index();
                if let Some(last) = self.last_path_index {
                    intermediate_reached = last != index;
                }
                self.last_path_index = Some(index);
                self.report.path_index = Some(index);
            }
        }

        let mut status = self
            .io
            .get_as::<TargetPoseStatus>(KEY_POSE_REACHED)
            .unwrap_or_default();

        self.target_cycles = self.target_cycles.saturating_add(1);
        if let Some(limit) = self.timeout_cycles {
            if status == TargetPoseStatus::Moving && self.target_cycles > limit {
                warn!("Target not reached after {} periods", limit);
                status = TargetPoseStatus::Timeout;
                self.report.timed_out = true;
            }
        }

        if intermediate_reached {
            self.notify(TargetPoseStatus::IntermediateReached);
        }
        if status != self.pose_reached {
            info!("Target status {:?} -> {:?}", self.pose_reached, status);
            self.pose_reached = status;
            if status != TargetPoseStatus::Moving {
                self.notify(status);
            }
        }

        match status {
            TargetPoseStatus::Blocked | TargetPoseStatus::Timeout => {
                error!("Motion aborted: {:?}", status);
                self.halted = true;
                self.report.halted = true;
                self.path.lock().map_err(|_| EngineError::PathPoisoned)?.stop();
                self.drive.stop();
                Ok(Polar::default())
            }
            _ => {
                let command = Polar::new(
                    self.io.get_or(KEY_LINEAR_SPEED_COMMAND, 0.0f64),
                    self.io.get_or(KEY_ANGULAR_SPEED_COMMAND, 0.0f64),
                );
                self.drive.set_polar_velocity(command);
                Ok(command)
            }
        }
    }

    fn notify(&mut self, status: TargetPoseStatus) {
        if let Some(ref mut cb) = self.pose_reached_cb {
            cb(status);
        }
    }
}
