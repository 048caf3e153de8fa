//! Publication of the chain signals for tuning

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::{ctrl::Controller, io::ControllersIO};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One period of telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub period: u64,
    pub linear_speed_order: f64,
    pub angular_speed_order: f64,
    pub linear_feedforward: f64,
    pub angular_feedforward: f64,
    pub linear_current_speed: f64,
    pub angular_current_speed: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryKeys {
    pub linear_speed_order: String,
    pub angular_speed_order: String,
    pub linear_feedforward: String,
    pub angular_feedforward: String,
    pub linear_current_speed: String,
    pub angular_current_speed: String,
}

/// Sink writing each sample as JSON to the log at debug level.
#[derive(Debug, Default)]
pub struct LogTelemetrySink;

/// Reads the speed signals of both axes every `divider` periods and hands them to a sink.
pub struct TelemetryController {
    name: String,
    keys: TelemetryKeys,
    sink: Box<dyn TelemetrySink>,
    divider: u64,
    period: u64,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Destination of the telemetry samples.
pub trait TelemetrySink: Send {
    fn publish(&mut self, sample: &TelemetrySample);
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TelemetryKeys {
    fn default() -> Self {
        Self {
            linear_speed_order: "linear_speed_order".to_string(),
            angular_speed_order: "angular_speed_order".to_string(),
            linear_feedforward: "linear_tracker_velocity".to_string(),
            angular_feedforward: "angular_tracker_velocity".to_string(),
            linear_current_speed: "current_linear_speed".to_string(),
            angular_current_speed: "current_angular_speed".to_string(),
        }
    }
}

impl TelemetrySink for LogTelemetrySink {
    fn publish(&mut self, sample: &TelemetrySample) {
        match serde_json::to_string(sample) {
            Ok(s) => debug!("telemetry {}", s),
            Err(e) => error!("Cannot serialize telemetry: {}", e),
        }
    }
}

impl TelemetryController {
    pub fn new(name: &str, keys: TelemetryKeys, sink: Box<dyn TelemetrySink>, divider: u64) -> Self {
        Self {
            name: name.to_string(),
            keys,
            sink,
            divider: divider.max(1),
            period: 0,
        }
    }

    /// Controller publishing every period to the log.
    pub fn to_log(name: &str) -> Self {
        Self::new(name, TelemetryKeys::default(), Box::new(LogTelemetrySink), 1)
    }
}

impl Controller for TelemetryController {
    fn type_name(&self) -> &'static str {
        "TelemetryController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let period = self.period;
        self.period += 1;

        if period % self.divider != 0 {
            return;
        }

        let k = &self.keys;
        let sample = TelemetrySample {
            period,
            linear_speed_order: io.get_or(&k.linear_speed_order, 0.0f64),
            angular_speed_order: io.get_or(&k.angular_speed_order, 0.0f64),
            linear_feedforward: io.get_or(&k.linear_feedforward, 0.0f64),
            angular_feedforward: io.get_or(&k.angular_feedforward, 0.0f64),
            linear_current_speed: io.get_or(&k.linear_current_speed, 0.0f64),
            angular_current_speed: io.get_or(&k.angular_current_speed, 0.0f64),
        };

        self.sink.publish(&sample);
    }

    fn reset(&mut self) {
        self.period = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct VecSink(Arc<Mutex<Vec<TelemetrySample>>>);

    impl TelemetrySink for VecSink {
        fn publish(&mut self, sample: &TelemetrySample) {
            self.0.lock().unwrap().push(*sample);
        }
    }

    #[test]
    fn test_publishes_every_divider() {
        let samples = Arc::new(Mutex::new(Vec::new()));
        let mut c = TelemetryController::new(
            "",
            TelemetryKeys::default(),
            Box::new(VecSink(samples.clone())),
            2,
        );
        let mut io = ControllersIO::new();
        io.write("linear_speed_order", 3.0);
        io.write("current_angular_speed", -1.0);

        for _ in 0..5 {
            c.execute(&mut io);
        }

        let samples = samples.lock().unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2].period, 4);
        assert_eq!(samples[0].linear_speed_order, 3.0);
        assert_eq!(samples[0].angular_current_speed, -1.0);
    }
}
