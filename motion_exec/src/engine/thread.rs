//! Periodic execution of the engine on its own thread

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use log::{error, info, warn};

use super::{EngineError, EngineInput, PlatformEngine};
use util::{archive::Archived, module::State, time::period_ms_to_duration};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Engine shared between its thread and the rest of the program.
pub type SharedEngine = Arc<Mutex<PlatformEngine>>;

/// Runs `PlatformEngine::proc` every period until stopped.
pub struct EngineThread {
    engine: SharedEngine,
    period: Duration,
    run: Arc<AtomicBool>,
    overruns: Arc<AtomicU64>,
    jh: Option<JoinHandle<()>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl EngineThread {
    pub fn new(engine: PlatformEngine) -> Self {
        let period = period_ms_to_duration(engine.params().period_ms);

        Self {
            engine: Arc::new(Mutex::new(engine)),
            period,
            run: Arc::new(AtomicBool::new(false)),
            overruns: Arc::new(AtomicU64::new(0)),
            jh: None,
        }
    }

    /// Handle on the engine, to send it targets while it runs.
    pub fn engine(&self) -> SharedEngine {
        self.engine.clone()
    }

    pub fn is_running(&self) -> bool {
        self.run.load(Ordering::Relaxed)
    }

    /// Number of periods which took longer than the period.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.jh.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        self.run.store(true, Ordering::Relaxed);

        let engine = self.engine.clone();
        let run = self.run.clone();
        let overruns = self.overruns.clone();
        let period = self.period;

        let jh = thread::Builder::new()
            .name("engine".to_string())
            .spawn(move || engine_thread(engine, run, overruns, period))
            .map_err(EngineError::SpawnError)?;
        self.jh = Some(jh);

        info!("Engine thread started, period {} ms", period.as_millis());
        Ok(())
    }

    /// Stop the thread and wait for the current period to finish.
    pub fn stop(&mut self) {
        self.run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.jh.take() {
            if jh.join().is_err() {
                warn!("Engine thread panicked before exiting");
            }
            info!("Engine thread stopped");
        }
    }
}

impl Drop for EngineThread {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn engine_thread(engine: SharedEngine, run: Arc<AtomicBool>, overruns: Arc<AtomicU64>, period: Duration) {
    let input = EngineInput::default();

    while run.load(Ordering::Relaxed) {
        let cycle_start = Instant::now();

        {
            let mut engine = match engine.lock() {
                Ok(e) => e,
                Err(_) => {
                    error!("{}", EngineError::EnginePoisoned);
                    break;
                }
            };

            if let Err(e) = engine.proc(&input) {
                error!("Engine processing error: {}", e);
            }
            if let Err(e) = engine.write() {
                warn!("Cannot archive the engine state: {}", e);
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start;

        match period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => {
                warn!(
                    "Engine cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - period.as_secs_f64()
                );
                overruns.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
