//! Trapezoidal velocity profile
//!
//! A profile is generated once for a commanded distance and then sampled every period. It has up
//! to four phases: braking to zero when the initial speed opposes the motion, acceleration,
//! cruise at the plateau velocity and deceleration to the final velocity. Velocities are in units
//! per period and accelerations in units per period squared, so the same profile serves the
//! linear (mm) and angular (deg) axes.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use serde::Serialize;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Distances and accelerations below this are treated as zero.
const EPSILON: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A generated trapezoidal profile.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrapezoidalProfile {
    initialized: bool,

    /// Signed distance the profile was generated for
    target_distance: f64,

    /// Signed initial velocity
    initial_velocity: f64,

    /// Velocity magnitude at the start of the acceleration phase
    accel_start_velocity: f64,

    /// Acceleration applied during the acceleration phase, 0 if there is none
    initial_phase_accel: f64,

    /// Signed cruise velocity
    plateau_velocity: f64,

    /// Velocity magnitude at the end of the profile
    final_velocity: f64,

    deceleration: f64,

    reverse_periods: u32,
    accel_periods: u32,
    plateau_periods: u32,
    decel_periods: u32,
    total_periods: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrapezoidalProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the fastest profile covering `distance`.
    ///
    /// # Inputs
    /// - `initial_velocity`: signed speed at the start of the profile
    /// - `distance`: signed distance to travel
    /// - `acceleration`, `deceleration`, `max_velocity`: kinematic limits, must be positive
    /// - `must_stop_at_end`: end at zero velocity, otherwise end at `max_velocity`
    ///
    /// # Outputs
    /// - The number of periods of the profile. Zero means a stationary profile: the distance is
    ///   null, the limits are invalid, or the robot is too fast to stop within the distance.
    pub fn generate(
        &mut self,
        initial_velocity: f64,
        distance: f64,
        acceleration: f64,
        deceleration: f64,
        max_velocity: f64,
        must_stop_at_end: bool,
    ) -> u32 {
        if distance.abs() < EPSILON
            || acceleration <= 0.0
            || deceleration <= 0.0
            || max_velocity <= 0.0
        {
            self.set_stationary();
            return 0;
        }

        *self = Self::default();
        self.target_distance = distance;
        self.initial_velocity = initial_velocity;
        self.deceleration = deceleration;
        self.final_velocity = if must_stop_at_end { 0.0 } else { max_velocity };

        let direction = sign(distance);
        let mut abs_distance = distance.abs();

        // Speed in the direction of motion. Moving the wrong way first needs a braking phase,
        // whose distance must be recovered.
        let v0 = initial_velocity * direction;
        let v_start = if v0 < 0.0 {
            self.reverse_periods = accel_periods(v0.abs(), 0.0, deceleration);
            abs_distance += discrete_distance(v0.abs(), -deceleration, self.reverse_periods);
            0.0
        } else {
            v0
        };
        self.accel_start_velocity = v_start;

        let accel_dist = accel_distance(v_start, max_velocity, acceleration);
        let decel_dist = accel_distance(max_velocity, self.final_velocity, deceleration);

        if accel_dist + decel_dist <= abs_distance {
            // Trapezoid: the plateau is reached
            self.plateau_velocity = max_velocity * direction;
            self.initial_phase_accel = acceleration;
            self.accel_periods = accel_periods(v_start, max_velocity, acceleration);
            self.decel_periods = accel_periods(max_velocity, self.final_velocity, deceleration);

            let cruise = abs_distance
                - discrete_distance(v_start, acceleration, self.accel_periods)
                - discrete_distance(max_velocity, -deceleration, self.decel_periods);
            self.plateau_periods = (cruise.max(0.0) / max_velocity).floor() as u32;
        } else {
            let v_peak = triangular_peak_velocity(
                abs_distance,
                v_start,
                self.final_velocity,
                acceleration,
                deceleration,
            );
            let v_final = self.final_velocity.min(v_peak);

            if v_start <= v_peak {
                // Triangle: accelerate to the peak then decelerate straight away
                self.plateau_velocity = v_peak * direction;
                self.initial_phase_accel = acceleration;
                self.accel_periods = accel_periods(v_start, v_peak, acceleration);
                self.decel_periods = accel_periods(v_peak, v_final, deceleration);
            } else {
                // Already faster than the peak: hold the initial speed then brake
                if accel_distance(v_start, v_final, deceleration) >= abs_distance {
                    debug!(
                        "Profile: cannot stop within {:.3} from {:.3}, stationary profile",
                        abs_distance, v_start
                    );
                    self.set_stationary();
                    return 0;
                }

                self.plateau_velocity = v_start * direction;
                self.initial_phase_accel = 0.0;
                self.decel_periods = accel_periods(v_start, v_final, deceleration);

                let cruise =
                    abs_distance - discrete_distance(v_start, -deceleration, self.decel_periods);
                self.plateau_periods = (cruise.max(0.0) / v_start).floor() as u32;
            }
        }

        self.initialized = true;
        self.total_periods = self.reverse_periods
            + self.accel_periods
            + self.plateau_periods
            + self.decel_periods;

        debug!(
            "Profile generated for {:.3}: {} reverse, {} accel, {} plateau at {:.3}, {} decel",
            distance,
            self.reverse_periods,
            self.accel_periods,
            self.plateau_periods,
            self.plateau_velocity,
            self.decel_periods
        );

        self.total_periods
    }

    /// Velocity the profile commands at `period`.
    pub fn velocity(&self, period: u32) -> f64 {
        if !self.initialized {
            return 0.0;
        }

        let direction = sign(self.plateau_velocity);
        let p = period as f64;

        let accel_start = self.reverse_periods;
        let plateau_start = accel_start + self.accel_periods;
        let decel_start = plateau_start + self.plateau_periods;

        if period < accel_start {
            self.initial_velocity - sign(self.initial_velocity) * self.deceleration * p
        } else if period < plateau_start {
            direction * self.accel_start_velocity
                + direction * self.initial_phase_accel * (p - accel_start as f64)
        } else if period < decel_start {
            self.plateau_velocity
        } else if period < self.total_periods {
            self.plateau_velocity - direction * self.deceleration * (p - decel_start as f64)
        } else {
            direction * self.final_velocity
        }
    }

    /// Distance left to travel at `period` under perfect tracking.
    pub fn remaining_distance(&self, period: u32) -> f64 {
        if !self.initialized {
            return 0.0;
        }

        let direction = sign(self.plateau_velocity);
        let mut travelled = 0.0;
        let mut elapsed = period;

        // Braking from a reverse initial speed
        let c = elapsed.min(self.reverse_periods) as f64;
        travelled += self.initial_velocity * c
            - sign(self.initial_velocity) * 0.5 * self.deceleration * c * c;
        elapsed = elapsed.saturating_sub(self.reverse_periods);

        // Acceleration
        let c = elapsed.min(self.accel_periods) as f64;
        travelled +=
            direction * (self.accel_start_velocity * c + 0.5 * self.initial_phase_accel * c * c);
        elapsed = elapsed.saturating_sub(self.accel_periods);

        // Plateau
        let c = elapsed.min(self.plateau_periods) as f64;
        travelled += self.plateau_velocity * c;
        elapsed = elapsed.saturating_sub(self.plateau_periods);

        // Deceleration
        let c = elapsed.min(self.decel_periods) as f64;
        travelled += self.plateau_velocity * c - direction * 0.5 * self.deceleration * c * c;

        self.target_distance - travelled
    }

    /// Forget the profile.
    pub fn reset(&mut self) {
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn total_periods(&self) -> u32 {
        self.total_periods
    }

    pub fn target_distance(&self) -> f64 {
        self.target_distance
    }

    pub fn plateau_velocity(&self) -> f64 {
        self.plateau_velocity
    }

    fn set_stationary(&mut self) {
        *self = Self::default();
        self.initialized = true;
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Number of periods needed to go from `v0` to `v1` at `accel`, rounded to the nearest period.
pub fn accel_periods(v0: f64, v1: f64, accel: f64) -> u32 {
    if accel.abs() < EPSILON {
        return 0;
    }
    ((v1 - v0).abs() / accel.abs() + 0.5).floor() as u32
}

/// Continuous distance needed to go from `v0` to `v1` at `accel`.
pub fn accel_distance(v0: f64, v1: f64, accel: f64) -> f64 {
    if accel.abs() < EPSILON {
        return 0.0;
    }
    ((v1 * v1 - v0 * v0) / (2.0 * accel)).abs()
}

/// Distance covered in `periods` starting at `v0` with a constant `accel`.
pub fn discrete_distance(v0: f64, accel: f64, periods: u32) -> f64 {
    let t = periods as f64;
    v0 * t + 0.5 * accel * t * t
}

/// Peak velocity of a profile without plateau covering `distance`.
pub fn triangular_peak_velocity(
    distance: f64,
    v0: f64,
    vf: f64,
    accel: f64,
    decel: f64,
) -> f64 {
    let v_squared =
        (2.0 * accel * decel * distance + decel * v0 * v0 + accel * vf * vf) / (accel + decel);
    v_squared.max(0.0).sqrt()
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn sign(value: f64) -> f64 {
    util::maths::sign(value)
}
