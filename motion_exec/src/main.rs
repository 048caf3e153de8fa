//! Motion control executable entry point.
//!
//! # Architecture
//!
//! The executable drives a simulated differential robot through the full motion pipeline:
//!
//!     - Initialise the session, logging and parameters
//!     - Build the controller chain and the platform engine, then start the engine thread
//!     - Main loop, at the planner period:
//!         - Command processing, from a script or the default path
//!         - Planning around the obstacles, which sets the engine targets
//!
//! # Usage
//!
//! `motion_exec [script]`. Without a script the default path of `motion_exec.toml` is followed.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use serde::Deserialize;
use std::env;
use std::thread;
use std::time::Instant;

// Internal
use motion_lib::{
    avoidance::Avoidance,
    chains::{
        pure_pursuit_chain, quadpid_chain, quadpid_tracker_chain, Chain, PurePursuitChainParams, QuadPidChainParams,
        TrackerChainParams,
    },
    engine::{EngineParams, EngineThread, PlatformEngine, SharedEngine},
    obstacles::{Obstacle, ObstacleDesc, ObstacleRegistry, ObstaclesParams},
    path::{Path, PathPose},
    planner::Planner,
    sim::SimPlatform,
};
use params::{ChainKind, MotionExecParams};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingCmds, ScriptInterpreter},
    session::{get_elapsed_seconds, Session},
    time::period_ms_to_duration,
};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Commands accepted in scripts.
#[derive(Debug, Deserialize)]
enum MotionCmd {
    /// Go to a single pose, around the obstacles
    GoTo(PathPose),

    /// Follow a path, around the obstacles
    Path {
        poses: Vec<PathPose>,
        #[serde(default)]
        play_in_loop: bool,
    },

    /// Stop on the spot
    Stop,

    /// Add an obstacle to a list
    Obstacle { list: String, obstacle: ObstacleDesc },

    /// Remove every obstacle of a list
    ClearObstacles { list: String },

    /// Enable or disable a list
    EnableObstacles { list: String, enabled: bool },
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("motion_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Motion Control Executable\n");
    info!("Running on: {}", host::get_host_desc());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: MotionExecParams =
        util::params::load("motion_exec.toml").wrap_err("Could not load the exec params")?;
    let obstacles_params: ObstaclesParams = util::params::load(&exec_params.obstacles_params)
        .wrap_err("Could not load the obstacles params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE COMMAND SOURCE ----

    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    let mut script: Option<ScriptInterpreter<MotionCmd>> = match args.len() {
        1 => {
            info!("No script provided, following the default path\n");
            None
        }
        2 => {
            info!("Loading script from \"{}\"", &args[1]);
            let si = ScriptInterpreter::new(&args[1]).wrap_err("Failed to load script")?;
            info!(
                "Loaded script lasts {:.02} s and contains {} commands\n",
                si.get_duration(),
                si.get_num_cmds()
            );
            Some(si)
        }
        n => return Err(eyre!("Expected either zero or one argument, found {}", n - 1)),
    };

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let path = Path::default().shared();

    let chain = match exec_params.chain {
        ChainKind::QuadPid => quadpid_chain(
            &util::params::load::<QuadPidChainParams>(&exec_params.chain_params)
                .wrap_err("Could not load the chain params")?,
            path.clone(),
        ),
        ChainKind::QuadPidTracker => quadpid_tracker_chain(
            &util::params::load::<TrackerChainParams>(&exec_params.chain_params)
                .wrap_err("Could not load the chain params")?,
            path.clone(),
        ),
        ChainKind::PurePursuit => pure_pursuit_chain(
            &util::params::load::<PurePursuitChainParams>(&exec_params.chain_params)
                .wrap_err("Could not load the chain params")?,
            path.clone(),
        ),
    }
    .wrap_err("Failed to build the controller chain")?;
    info!("{:?} chain built", exec_params.chain);

    let sim = SimPlatform::new(exec_params.drive.clone(), exec_params.initial_pose)
        .wrap_err("Invalid drive parameters")?;
    let mut engine = PlatformEngine::new(
        EngineParams::default(),
        Box::new(sim.localization),
        Box::new(sim.drive),
        path,
    );
    engine.init("engine.toml", &session).wrap_err("Failed to initialise the engine")?;
    engine.set_controller(chain.root.clone());
    engine.set_pose_reached_cb(Box::new(|status| info!("Target status: {:?}", status)));
    info!("Engine init complete");

    let registry = ObstacleRegistry::from_params(&obstacles_params).wrap_err("Failed to load the obstacles")?;
    let avoidance =
        Avoidance::from_params(registry.clone(), &obstacles_params).wrap_err("Failed to initialise the avoidance")?;
    let mut planner = Planner::new(exec_params.planner.clone(), avoidance);
    info!("Planner init complete, {} obstacles", registry.count());

    info!("Module initialisation complete\n");

    if script.is_none() {
        if exec_params.default_path.is_empty() {
            return Err(eyre!("No script given and the default path is empty"));
        }
        planner
            .follow(exec_params.default_path.clone(), false)
            .wrap_err("Invalid default path")?;
    }

    // ---- START ENGINE ----

    let mut engine_thread = EngineThread::new(engine);
    let shared_engine = engine_thread.engine();
    engine_thread.start().wrap_err("Failed to start the engine thread")?;

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let period = period_ms_to_duration(planner.params().period_ms);
    let mut end_of_script = script.is_none();

    loop {
        let cycle_start = Instant::now();

        // ---- COMMAND PROCESSING ----

        if let Some(ref mut si) = script {
            match si.get_pending() {
                PendingCmds::None => (),
                PendingCmds::Some(cmds) => {
                    for cmd in cmds {
                        if let Err(e) = exec_cmd(cmd, &mut planner, &shared_engine, &chain, &registry) {
                            warn!("Command failed: {:#}", e);
                        }
                    }
                }
                PendingCmds::EndOfScript => {
                    if !end_of_script {
                        info!("End of script reached");
                        end_of_script = true;
                    }
                }
            }
        }

        // ---- PLANNING ----

        {
            let mut engine = shared_engine.lock().map_err(|_| eyre!("Engine lock poisoned"))?;

            if let Err(e) = planner.step(&mut engine) {
                warn!("Planner error: {}", e);
                chain.force_finished();
            }
        }

        // ---- EXIT CONDITIONS ----

        if end_of_script && !planner.is_started() {
            info!("Nothing left to do");
            break;
        }
        if exec_params.max_run_time_s > 0.0 && get_elapsed_seconds() > exec_params.max_run_time_s {
            warn!("Maximum run time of {:.1} s reached", exec_params.max_run_time_s);
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start;

        match period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - period.as_secs_f64()
            ),
        }
    }

    // ---- SHUTDOWN ----

    engine_thread.stop();
    info!("Engine overran {} times", engine_thread.overruns());

    session.save("avoidance/path.json", planner.avoidance().path_json());
    session.save("avoidance/obstacles.json", registry.to_json());

    if let Ok(engine) = shared_engine.lock() {
        let pose = engine.pose();
        info!("Final pose: ({:.1}, {:.1}, {:.1})", pose.x, pose.y, pose.o);
    }

    session.exit();

    Ok(())
}

/// Execute a scripted command.
fn exec_cmd(
    cmd: MotionCmd,
    planner: &mut Planner,
    engine: &SharedEngine,
    chain: &Chain,
    registry: &ObstacleRegistry,
) -> Result<(), Report> {
    info!("Executing {:?}", cmd);

    match cmd {
        MotionCmd::GoTo(pose) => planner.follow(vec![pose], false)?,
        MotionCmd::Path { poses, play_in_loop } => planner.follow(poses, play_in_loop)?,
        MotionCmd::Stop => {
            planner.stop();
            chain.force_finished();
            engine.lock().map_err(|_| eyre!("Engine lock poisoned"))?.stop()?;
        }
        MotionCmd::Obstacle { list, obstacle } => {
            let obstacle = Obstacle::from_desc(&obstacle)?;
            registry
                .list(&list)?
                .lock()
                .map_err(|_| eyre!("Obstacle list {} poisoned", list))?
                .push(obstacle)?;
        }
        MotionCmd::ClearObstacles { list } => {
            registry
                .list(&list)?
                .lock()
                .map_err(|_| eyre!("Obstacle list {} poisoned", list))?
                .clear();
        }
        MotionCmd::EnableObstacles { list, enabled } => {
            registry
                .list(&list)?
                .lock()
                .map_err(|_| eyre!("Obstacle list {} poisoned", list))?
                .set_enabled(enabled);
        }
    }

    Ok(())
}
