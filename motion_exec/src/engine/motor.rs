//! Engine driving a single motor to a distance along its axis
//!
//! Lifts and arms are driven by one motor and followed by one encoder. Every period the engine
//! integrates the encoder into a distance, publishes it with the target into its own
//! `ControllersIO`, executes the chain (typically a `MotorPoseFilter` followed by the pose and
//! speed loops, see `chains::motor_chain`) and converts the resulting speed command into a motor
//! command with the drive parameters.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};

// Internal
use super::{EngineError, EngineParams};
use crate::{
    ctrl::{execute_controller, reset_controller, ControllerRef},
    drive::{DriveError, DriveParams, Motor},
    io::{ControllersIO, TargetPoseStatus},
    loc::Encoder,
};
use util::{module::State, params, session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Keys published and read by the engine, prefixed with the motor name.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotorEngineKeys {
    pub current_pose: String,
    pub target_pose: String,
    pub current_speed: String,
    pub target_speed: String,
    pub pose_reached: String,
    pub speed_command: String,
}

/// A move of the motor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotorTarget {
    /// Units: millimeters
    pub distance: f64,

    /// Units: millimeters/period
    pub speed: f64,

    /// Overrides the default timeout when non zero.
    ///
    /// Units: milliseconds
    pub timeout_ms: u32,
}

/// Input data to the motor engine.
#[derive(Debug, Clone, Default)]
pub struct MotorEngineInput {
    /// New target, or `None` to carry on with the current one
    pub target: Option<MotorTarget>,
}

/// Result of one period.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MotorEngineOutput {
    /// Units: millimeters
    pub distance: f64,

    /// Units: millimeters/period
    pub speed: f64,

    /// Command sent to the motor.
    ///
    /// Units: percent
    pub command: f64,

    pub pose_reached: TargetPoseStatus,
}

/// Motor engine module state
pub struct MotorEngine<M: Motor, E: Encoder> {
    name: String,
    params: EngineParams,
    drive: DriveParams,
    keys: MotorEngineKeys,

    io: ControllersIO,
    controller: Option<ControllerRef>,
    motor: M,
    encoder: E,

    /// Integrated encoder distance.
    ///
    /// Units: millimeters
    distance: f64,

    /// Distance travelled during the last period.
    ///
    /// Units: millimeters/period
    speed: f64,

    target: MotorTarget,
    pose_reached: TargetPoseStatus,
    enabled: bool,

    timeout_cycles: Option<u32>,
    target_cycles: u32,

    warned_no_controller: bool,
    output: MotorEngineOutput,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotorEngineKeys {
    /// Keys matching `MotorPoseKeys::for_motor` and `SpeedPidKeys::for_axis`.
    pub fn for_motor(motor: &str) -> Self {
        Self {
            current_pose: format!("{}_current_pose", motor),
            target_pose: format!("{}_target_pose", motor),
            current_speed: format!("{}_current_speed", motor),
            target_speed: format!("{}_target_speed", motor),
            pose_reached: format!("{}_pose_reached", motor),
            speed_command: format!("{}_speed_command", motor),
        }
    }
}

impl Default for MotorEngineKeys {
    fn default() -> Self {
        Self::for_motor("motor")
    }
}

impl<M: Motor, E: Encoder> State for MotorEngine<M, E> {
    const NAME: &'static str = "motor_engine";

    type InitData = &'static str;

    type Input = MotorEngineInput;
    type Output = MotorEngineOutput;
    type Status = TargetPoseStatus;

    type Error = EngineError;

    /// Load the engine parameters (period and timeouts) from the given file.
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), Self::Error> {
        self.params = params::load(init_data)?;

        info!(
            "{} [{}] initialised with a {} ms period",
            Self::NAME,
            self.name,
            self.params.period_ms
        );

        Ok(())
    }

    fn proc(&mut self, input_data: &Self::Input) -> Result<(Self::Output, Self::Status), Self::Error> {
        if let Some(target) = input_data.target {
            self.set_target(target);
        }

        self.speed = self.encoder.read_delta_mm();
        self.distance += self.speed;

        let controller = match self.controller {
            Some(ref c) if self.enabled => c.clone(),
            _ => {
                if self.controller.is_none() {
                    if !self.warned_no_controller {
                        warn!("{} [{}]: no controller attached, commanding zero speed", Self::NAME, self.name);
                        self.warned_no_controller = true;
                    }
                    self.motor.set_speed(0.0);
                }

                self.output = MotorEngineOutput {
                    distance: self.distance,
                    speed: self.speed,
                    command: 0.0,
                    pose_reached: self.pose_reached,
                };
                return Ok((self.output, self.pose_reached));
            }
        };

        self.prepare_inputs();

        execute_controller(&controller, &mut self.io);
        if self.io.take_reset_request() {
            reset_controller(&controller);
        }

        let command = self.process_outputs();

        self.output = MotorEngineOutput {
            distance: self.distance,
            speed: self.speed,
            command,
            pose_reached: self.pose_reached,
        };
        Ok((self.output, self.pose_reached))
    }
}

impl<M: Motor, E: Encoder> MotorEngine<M, E> {
    /// Build the engine of motor `name`, rejecting drive parameters the speed conversion can't
    /// use.
    pub fn new(name: &str, params: EngineParams, drive: DriveParams, motor: M, encoder: E) -> Result<Self, DriveError> {
        drive.validate()?;

        Ok(Self {
            name: name.to_string(),
            params,
            drive,
            keys: MotorEngineKeys::for_motor(name),
            io: ControllersIO::new(),
            controller: None,
            motor,
            encoder,
            distance: 0.0,
            speed: 0.0,
            target: MotorTarget::default(),
            pose_reached: TargetPoseStatus::Reached,
            enabled: true,
            timeout_cycles: None,
            target_cycles: 0,
            warned_no_controller: false,
            output: MotorEngineOutput::default(),
        })
    }

    /// Attach the chain, resetting it.
    pub fn set_controller(&mut self, controller: ControllerRef) {
        reset_controller(&controller);
        info!(
            "{} [{}] controller:\n{}",
            Self::NAME,
            self.name,
            crate::ctrl::dump_controller(&controller, 1)
        );
        self.controller = Some(controller);
        self.warned_no_controller = false;
    }

    /// Start a new move. A disabled engine stays disabled until `enable` is called.
    pub fn set_target(&mut self, target: MotorTarget) {
        debug!(
            "{} [{}]: new target {:.1} at {:.2}",
            Self::NAME,
            self.name,
            target.distance,
            target.speed
        );

        self.target = target;
        self.pose_reached = TargetPoseStatus::Moving;
        self.target_cycles = 0;

        let timeout_ms = if target.timeout_ms > 0 {
            target.timeout_ms
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

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Disable the control and let the motor spin freely.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.motor.disable();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Units: millimeters
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Overwrite the integrated distance (e.g. on a homing switch).
    pub fn set_distance(&mut self, distance: f64) {
        info!("{} [{}]: distance set to {:.1}", Self::NAME, self.name, distance);
        self.distance = distance;
    }

    /// Units: millimeters/period
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn target(&self) -> &MotorTarget {
        &self.target
    }

    pub fn pose_reached(&self) -> TargetPoseStatus {
        self.pose_reached
    }

    pub fn keys(&self) -> &MotorEngineKeys {
        &self.keys
    }

    pub fn io(&self) -> &ControllersIO {
        &self.io
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    /// Publish the motor state and the target.
    fn prepare_inputs(&mut self) {
        self.io.clear_modified();

        let k = &self.keys;
        self.io.write(&k.current_pose, self.distance);
        self.io.write(&k.target_pose, self.target.distance);
        self.io.write(&k.current_speed, self.speed);
        self.io.write(&k.target_speed, self.target.speed);
        self.io.write(&k.pose_reached, TargetPoseStatus::Moving);
        self.io.write(&k.speed_command, 0.0);

        trace!(
            "{} [{}]: distance {:.2}, speed {:.2}",
            Self::NAME,
            self.name,
            self.distance,
            self.speed
        );
    }

    /// Update the target status and command the motor, returning the command in percent.
    fn process_outputs(&mut self) -> f64 {
        let mut status = self
            .io
            .get_as::<TargetPoseStatus>(&self.keys.pose_reached)
            .unwrap_or_default();

        if let Some(limit) = self.timeout_cycles {
            // Holding the reached position never times out
            if status == TargetPoseStatus::Reached {
                self.target_cycles = 0;
            }
            else {
                self.target_cycles = self.target_cycles.saturating_add(1);
                if self.target_cycles > limit {
                    warn!("{} [{}]: target not reached after {} periods", Self::NAME, self.name, limit);
                    status = TargetPoseStatus::Timeout;
                }
            }
        }

        if status != self.pose_reached {
            info!("{} [{}]: target status {:?} -> {:?}", Self::NAME, self.name, self.pose_reached, status);
            self.pose_reached = status;
        }

        match status {
            TargetPoseStatus::Blocked | TargetPoseStatus::Timeout => {
                error!("{} [{}]: {:?}, disabling the motor", Self::NAME, self.name, status);
                self.enabled = false;
                self.motor.disable();
                0.0
            }
            _ => {
                let speed_command = self.io.get_or(&self.keys.speed_command, 0.0f64);
                let command = self.drive.mm_per_period_to_percent(speed_command);
                self.motor.set_speed(command);
                command
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::{
        chains::{motor_chain, MotorChainParams},
        filters::SpeedFilterParams,
        pid::PidParams,
        sim::{SharedWheel, SimEncoder, SimMotor, SimWheel},
    };

    type SimMotorEngine = MotorEngine<SimMotor, SimEncoder>;

    fn chain_params(anti_blocking: bool) -> MotorChainParams {
        MotorChainParams {
            pose_pid: PidParams {
                kp: 0.5,
                ..Default::default()
            },
            speed_filter: SpeedFilterParams {
                max_speed: 8.0,
                anti_blocking,
                anti_blocking_error_threshold: 0.5,
                anti_blocking_blocked_cycles_nb_threshold: 5,
                ..Default::default()
            },
            speed_pid: PidParams {
                kp: 0.0,
                ki: 1.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn engine(params: EngineParams, chain: &MotorChainParams) -> (SimMotorEngine, SharedWheel) {
        let wheel: SharedWheel = Arc::new(Mutex::new(SimWheel::default()));
        let drive = DriveParams::default();

        let mut engine = MotorEngine::new(
            "lift",
            params,
            drive.clone(),
            SimMotor::new(wheel.clone()),
            SimEncoder::new(wheel.clone(), drive),
        )
        .unwrap();
        engine.set_controller(motor_chain("lift", chain).unwrap().root);

        (engine, wheel)
    }

    fn run(engine: &mut SimMotorEngine, periods: usize) -> Vec<MotorEngineOutput> {
        (0..periods)
            .map(|_| engine.proc(&MotorEngineInput::default()).unwrap().0)
            .collect()
    }

    #[test]
    fn test_reaches_target() {
        let (mut engine, wheel) = engine(EngineParams::default(), &chain_params(false));

        let target = MotorTarget {
            distance: 100.0,
            speed: 5.0,
            timeout_ms: 0,
        };
        let (_, status) = engine
            .proc(&MotorEngineInput { target: Some(target) })
            .unwrap();
        assert_eq!(status, TargetPoseStatus::Moving);
        assert_eq!(engine.io().get_as::<f64>("lift_target_pose"), Some(100.0));

        let outputs = run(&mut engine, 200);
        let reached_at = outputs
            .iter()
            .position(|o| o.pose_reached == TargetPoseStatus::Reached)
            .expect("target not reached within 200 periods");
        assert!(reached_at > 20);

        // The target speed caps the one given to the chain
        assert!(outputs.iter().all(|o| o.speed <= 5.0 + 1e-9));
        assert!(outputs.iter().any(|o| (o.speed - 5.0).abs() < 1e-9));

        assert!((engine.distance() - 100.0).abs() <= 1.0);
        assert!((wheel.lock().unwrap().odometer_mm - engine.distance()).abs() < 1e-9);
        assert_eq!(engine.pose_reached(), TargetPoseStatus::Reached);
        assert!(engine.is_enabled());
    }

    #[test]
    fn test_moves_backward() {
        let (mut engine, _) = engine(EngineParams::default(), &chain_params(false));
        engine.set_distance(50.0);
        engine.set_target(MotorTarget {
            distance: 0.0,
            speed: 10.0,
            timeout_ms: 0,
        });

        let outputs = run(&mut engine, 200);
        assert!(outputs[1].command < 0.0);
        assert!(outputs.iter().all(|o| o.speed >= -8.0 - 1e-9));
        assert!(engine.distance().abs() <= 1.0);
        assert_eq!(engine.pose_reached(), TargetPoseStatus::Reached);
    }

    #[test]
    fn test_blocked_disables() {
        let (mut engine, wheel) = engine(EngineParams::default(), &chain_params(true));
        wheel.lock().unwrap().blocked = true;

        engine.set_target(MotorTarget {
            distance: 100.0,
            speed: 5.0,
            timeout_ms: 0,
        });
        let outputs = run(&mut engine, 20);

        let blocked_at = outputs
            .iter()
            .position(|o| o.pose_reached == TargetPoseStatus::Blocked)
            .expect("stall not detected");
        assert_eq!(outputs[blocked_at].command, 0.0);
        assert!(!engine.is_enabled());
        assert_eq!(wheel.lock().unwrap().percent, 0.0);
        assert_eq!(engine.distance(), 0.0);

        // Stays put until enabled again
        assert!(outputs[blocked_at..].iter().all(|o| o.command == 0.0));
        wheel.lock().unwrap().blocked = false;
        engine.enable();
        engine.set_target(MotorTarget {
            distance: 10.0,
            speed: 5.0,
            timeout_ms: 0,
        });
        run(&mut engine, 100);
        assert_eq!(engine.pose_reached(), TargetPoseStatus::Reached);
    }

    #[test]
    fn test_timeout() {
        let params = EngineParams {
            timeout_enabled: true,
            default_timeout_ms: 100,
            ..Default::default()
        };
        let (mut engine, wheel) = engine(params, &chain_params(false));
        wheel.lock().unwrap().blocked = true;

        engine.set_target(MotorTarget {
            distance: 100.0,
            speed: 5.0,
            timeout_ms: 0,
        });
        let outputs = run(&mut engine, 10);

        // 100 ms are 5 periods of 20 ms
        assert_eq!(outputs[4].pose_reached, TargetPoseStatus::Moving);
        assert_eq!(outputs[5].pose_reached, TargetPoseStatus::Timeout);
        assert!(!engine.is_enabled());
        assert_eq!(wheel.lock().unwrap().percent, 0.0);
    }

    #[test]
    fn test_holding_position_never_times_out() {
        let params = EngineParams {
            timeout_enabled: true,
            default_timeout_ms: 1000,
            ..Default::default()
        };
        let (mut engine, _) = engine(params, &chain_params(false));

        // A per target timeout overrides the default one
        engine.set_target(MotorTarget {
            distance: 20.0,
            speed: 5.0,
            timeout_ms: 2000,
        });
        let outputs = run(&mut engine, 150);

        assert!(outputs[90..].iter().all(|o| o.pose_reached == TargetPoseStatus::Reached));
        assert!(engine.is_enabled());
    }

    #[test]
    fn test_without_controller() {
        let wheel: SharedWheel = Arc::new(Mutex::new(SimWheel {
            percent: 30.0,
            ..Default::default()
        }));
        let drive = DriveParams::default();
        let mut engine = MotorEngine::new(
            "arm",
            EngineParams::default(),
            drive.clone(),
            SimMotor::new(wheel.clone()),
            SimEncoder::new(wheel.clone(), drive),
        )
        .unwrap();

        let (output, _) = engine.proc(&MotorEngineInput::default()).unwrap();
        assert_eq!(output.command, 0.0);
        assert_eq!(wheel.lock().unwrap().percent, 0.0);
        assert!(output.distance > 0.0);
        assert_eq!(engine.keys().speed_command, "arm_speed_command");
    }

    #[test]
    fn test_rejects_invalid_drive() {
        let wheel: SharedWheel = Arc::new(Mutex::new(SimWheel::default()));
        let drive = DriveParams {
            motor_kv: 0.0,
            ..Default::default()
        };

        let engine = MotorEngine::new(
            "lift",
            EngineParams::default(),
            drive.clone(),
            SimMotor::new(wheel.clone()),
            SimEncoder::new(wheel, drive),
        );
        assert!(matches!(engine, Err(DriveError::NonPositiveParam("motor_kv", _))));
    }
}
