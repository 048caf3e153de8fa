//! # PID corrector
//!
//! A single-axis discrete PID, evaluated once per control period. The integral term is clamped
//! to `±integral_limit` and the derivative is the plain difference of successive errors, so the
//! caller must `reset` it whenever the control regime changes.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains of a PID corrector.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PidParams {
    /// Proportional gain
    pub kp: f64,

    /// Integral gain
    #[serde(default)]
    pub ki: f64,

    /// Derivative gain
    #[serde(default)]
    pub kd: f64,

    /// Bound on the absolute value of the integral accumulation.
    #[serde(default = "default_integral_limit")]
    pub integral_limit: f64
}

/// A PID controller
#[derive(Debug, Clone, Serialize)]
pub struct Pid {
    kp: f64,
    ki: f64,
    kd: f64,

    /// Accumulated error, clamped to `±integral_limit`
    integral_term: f64,
    integral_limit: f64,

    previous_error: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PidParams {
    fn default() -> Self {
        Self {
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            integral_limit: default_integral_limit()
        }
    }
}

impl Pid {
    /// Create a new controller with the given gains.
    pub fn new(kp: f64, ki: f64, kd: f64, integral_limit: f64) -> Self {
        Self {
            kp, ki, kd,
            integral_term: 0.0,
            integral_limit: integral_limit.abs(),
            previous_error: 0.0
        }
    }

    pub fn from_params(params: &PidParams) -> Self {
        Self::new(params.kp, params.ki, params.kd, params.integral_limit)
    }

    /// Compute the correction for the given error.
    pub fn compute(&mut self, error: f64) -> f64 {
        // Accumulate the integral term and bound it
        self.integral_term += error;
        if self.integral_term > self.integral_limit {
            self.integral_term = self.integral_limit;
        }
        else if self.integral_term < -self.integral_limit {
            self.integral_term = -self.integral_limit;
        }

        let out = self.kp * error
            + self.ki * self.integral_term
            + self.kd * (error - self.previous_error);

        self.previous_error = error;

        out
    }

    /// Zero the integral and previous error.
    pub fn reset(&mut self) {
        self.integral_term = 0.0;
        self.previous_error = 0.0;
    }

    pub fn kp(&self) -> f64 { self.kp }
    pub fn ki(&self) -> f64 { self.ki }
    pub fn kd(&self) -> f64 { self.kd }
    pub fn integral_term(&self) -> f64 { self.integral_term }
    pub fn integral_limit(&self) -> f64 { self.integral_limit }
    pub fn previous_error(&self) -> f64 { self.previous_error }

    pub fn set_kp(&mut self, kp: f64) { self.kp = kp; }
    pub fn set_ki(&mut self, ki: f64) { self.ki = ki; }
    pub fn set_kd(&mut self, kd: f64) { self.kd = kd; }

    pub fn set_integral_limit(&mut self, limit: f64) {
        self.integral_limit = limit.abs();
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_integral_limit() -> f64 {
    std::f64::MAX
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_integral_clamp() {
        let mut pid = Pid::new(1.0, 0.5, 0.1, 10.0);

        let errors = [4.0, 8.0, 12.0, -3.0, -40.0, -2.0, 25.0, 0.0, 7.5];
        for e in errors.iter() {
            pid.compute(*e);
            assert!(pid.integral_term().abs() <= 10.0);
        }

        // Saturated at the low bound after the large negative error
        let mut pid = Pid::new(0.0, 1.0, 0.0, 5.0);
        assert_eq!(pid.compute(-100.0), -5.0);
        assert_eq!(pid.compute(1.0), -4.0);
    }

    #[test]
    fn test_output() {
        let mut pid = Pid::new(2.0, 0.5, 1.0, 100.0);

        // kp*e + ki*I + kd*(e - prev)
        assert_eq!(pid.compute(2.0), 2.0 * 2.0 + 0.5 * 2.0 + 1.0 * 2.0);
        assert_eq!(pid.compute(1.0), 2.0 * 1.0 + 0.5 * 3.0 + 1.0 * -1.0);
        assert_eq!(pid.previous_error(), 1.0);
    }

    #[test]
    fn test_reset_idempotence() {
        let mut used = Pid::new(1.2, 0.3, 0.7, 50.0);
        for e in [5.0, -2.0, 9.0, 3.0].iter() {
            used.compute(*e);
        }
        used.reset();
        used.reset();

        let mut fresh = Pid::new(1.2, 0.3, 0.7, 50.0);

        assert_eq!(used.compute(4.0), fresh.compute(4.0));
    }
}
