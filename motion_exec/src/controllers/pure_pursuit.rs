//! Adaptive pure pursuit path following
//!
//! Follows the whole shared path as one continuous curve rather than stopping on each waypoint.
//! Every period a lookahead point is searched on the path, at a distance growing with the speed,
//! and the robot is steered on the arc joining it to that point.
//!
//! Before moving, a robot restricted to one direction first turns toward its direction of travel.
//! At the end of the path it turns to the orientation of the last waypoint. During both rotations
//! the controller publishes the angular pose error and raises `rotating_in_place`, the rotation
//! itself being left to a pose loop the chain switches in on that flag.
//!
//! While no path is followed the orders are zero and the target status is left untouched.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, error, info, trace};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    ctrl::Controller,
    io::{ControllersIO, TargetPoseStatus},
    loc::Pose,
    path::{MotionDirection, Path, PathPose, SharedPath},
};
use util::maths::{clamp, limit_angle_deg};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Lower bound of the distance to the lookahead point used in the curvature.
///
/// Units: millimeters
const MIN_CHORD_MM: f64 = 1.0;

/// Below this curvature the path is straight and doesn't limit the speed.
///
/// Units: 1/millimeters
const MIN_CURVATURE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PurePursuitParams {
    /// Units: millimeters
    pub min_lookahead_distance: f64,

    /// Units: millimeters
    pub max_lookahead_distance: f64,

    /// Lookahead distance added per unit of linear speed.
    ///
    /// Units: periods
    pub lookahead_speed_ratio: f64,

    /// Units: millimeters/period
    pub max_linear_speed: f64,

    /// Units: degrees/period
    pub max_angular_speed: f64,

    /// Remaining path length below which the position is reached.
    ///
    /// Units: millimeters
    pub linear_threshold: f64,

    /// Units: degrees
    pub angular_threshold: f64,

    /// Heading error below which the initial rotation ends.
    ///
    /// Units: degrees
    pub initial_rotation_threshold: f64,

    /// Units: millimeters/period²
    pub linear_acceleration: f64,

    /// Units: millimeters/period²
    pub linear_deceleration: f64,

    /// Units: degrees/period²
    pub angular_deceleration: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PurePursuitKeys {
    pub current_pose_x: String,
    pub current_pose_y: String,
    pub current_pose_o: String,
    pub current_linear_speed: String,
    pub current_angular_speed: String,

    /// Measured speeds republished under the names of the loops downstream
    pub linear_current_speed: String,
    pub angular_current_speed: String,

    pub linear_speed_order: String,
    pub angular_speed_order: String,
    pub pose_reached: String,
    pub angular_pose_error: String,
    pub recompute_angular_profile: String,
    pub rotating_in_place: String,

    pub path_complete: Option<String>,
    pub is_intermediate: Option<String>,
}

/// Follows the shared path with an adaptive lookahead.
pub struct AdaptivePurePursuitController {
    name: String,
    keys: PurePursuitKeys,
    params: PurePursuitParams,
    path: SharedPath,

    state: PurePursuitState,

    /// Segment holding the last lookahead point, 0 being the robot to first waypoint one
    segment_index: usize,

    /// Position of the last lookahead point along its segment, in `[0, 1]`
    segment_param: f64,

    /// Direction picked for the whole path in bidirectional mode
    locked_backward: Option<bool>,

    first_rotating_cycle: bool,
    needs_path_init: bool,

    /// Heading to reach before following the path.
    ///
    /// Units: degrees
    direction_angle: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PurePursuitState {
    RotatingToDirection,
    FollowingPath,
    RotatingToFinal,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PurePursuitParams {
    fn default() -> Self {
        Self {
            min_lookahead_distance: 100.0,
            max_lookahead_distance: 300.0,
            lookahead_speed_ratio: 10.0,
            max_linear_speed: 10.0,
            max_angular_speed: 5.0,
            linear_threshold: 10.0,
            angular_threshold: 2.0,
            initial_rotation_threshold: 45.0,
            linear_acceleration: 0.1,
            linear_deceleration: 0.1,
            angular_deceleration: 0.1,
        }
    }
}

impl Default for PurePursuitKeys {
    fn default() -> Self {
        Self {
            current_pose_x: "current_pose_x".into(),
            current_pose_y: "current_pose_y".into(),
            current_pose_o: "current_pose_O".into(),
            current_linear_speed: "current_linear_speed".into(),
            current_angular_speed: "current_angular_speed".into(),
            linear_current_speed: "linear_current_speed".into(),
            angular_current_speed: "angular_current_speed".into(),
            linear_speed_order: "linear_speed_order".into(),
            angular_speed_order: "angular_speed_order".into(),
            pose_reached: "pose_reached".into(),
            angular_pose_error: "angular_pose_error".into(),
            recompute_angular_profile: "angular_recompute_profile".into(),
            rotating_in_place: "rotating_in_place".into(),
            path_complete: Some("path_complete".into()),
            is_intermediate: Some("is_intermediate".into()),
        }
    }
}

impl AdaptivePurePursuitController {
    pub fn new(name: &str, keys: PurePursuitKeys, params: PurePursuitParams, path: SharedPath) -> Self {
        Self {
            name: name.to_string(),
            keys,
            params,
            path,
            state: PurePursuitState::RotatingToDirection,
            segment_index: 0,
            segment_param: 0.0,
            locked_backward: None,
            first_rotating_cycle: true,
            needs_path_init: true,
            direction_angle: 0.0,
        }
    }

    pub fn state(&self) -> PurePursuitState {
        self.state
    }

    pub fn segment_index(&self) -> usize {
        self.segment_index
    }

    pub fn params(&self) -> &PurePursuitParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut PurePursuitParams {
        &mut self.params
    }

    /// Lookahead distance at `speed`, growing with it between the two bounds.
    ///
    /// Units: millimeters/period to millimeters
    pub fn lookahead_distance(&self, speed: f64) -> f64 {
        let p = &self.params;
        clamp(
            p.min_lookahead_distance + speed.abs() * p.lookahead_speed_ratio,
            p.min_lookahead_distance,
            p.max_lookahead_distance,
        )
    }

    /// Start a new path: pick the direction of travel and the first phase.
    fn init_path(&mut self, first: &PathPose, robot: &Pose, direction: MotionDirection) {
        self.segment_index = 0;
        self.segment_param = 0.0;
        self.locked_backward = None;

        let bearing = (first.pose.y - robot.y).atan2(first.pose.x - robot.x).to_degrees();
        let backward = match direction {
            MotionDirection::ForwardOnly => false,
            MotionDirection::BackwardOnly => true,
            MotionDirection::Bidirectional => {
                let backward = limit_angle_deg(bearing - robot.o).abs() > 90.0;
                self.locked_backward = Some(backward);
                backward
            }
        };

        self.direction_angle = if backward {
            limit_angle_deg(bearing + 180.0)
        }
        else {
            bearing
        };

        // Bidirectional moves turn while driving
        self.state = match direction {
            MotionDirection::Bidirectional => PurePursuitState::FollowingPath,
            _ => PurePursuitState::RotatingToDirection,
        };
        self.first_rotating_cycle = true;
        self.needs_path_init = false;

        debug!(
            "{} [{}]: new path, heading {:.1}{}, {:?}",
            self.type_name(),
            self.name,
            self.direction_angle,
            if backward { " backward" } else { "" },
            self.state
        );
    }

    /// Search the lookahead point from the current segment on.
    ///
    /// The point never moves back along the path. Without any intersection the end of the
    /// current segment is used.
    fn find_lookahead_point(&mut self, poses: &[PathPose], robot: &Pose, radius: f64) -> Point2<f64> {
        let center = robot.coords();

        if self.segment_index >= poses.len() {
            self.segment_index = 0;
            self.segment_param = 0.0;
        }

        for i in self.segment_index..poses.len() {
            let start = if i == 0 { center } else { poses[i - 1].pose.coords() };
            let end = poses[i].pose.coords();

            if let Some((t, point)) = circle_segment_intersection(&start, &end, &center, radius) {
                if i > self.segment_index || t > self.segment_param {
                    self.segment_index = i;
                    self.segment_param = t;
                    return point;
                }
            }
        }

        poses[self.segment_index].pose.coords()
    }

    /// Length left to drive: to the end of the current segment, then along the next ones.
    fn distance_to_goal(&self, poses: &[PathPose], robot: &Pose) -> f64 {
        let start = if self.segment_index < poses.len() {
            self.segment_index
        }
        else {
            0
        };

        let remaining: f64 = poses[start..]
            .windows(2)
            .map(|w| (w[1].pose.coords() - w[0].pose.coords()).norm())
            .sum();

        (poses[start].pose.coords() - robot.coords()).norm() + remaining
    }

    fn write_orders(&self, io: &mut ControllersIO, linear: f64, angular: f64, status: TargetPoseStatus) {
        io.write(&self.keys.linear_speed_order, linear);
        io.write(&self.keys.angular_speed_order, angular);
        io.write(&self.keys.pose_reached, status);
    }

    /// Hand the rotation over to the pose loop.
    fn write_rotation(&mut self, io: &mut ControllersIO, angular_error: f64) {
        io.write(&self.keys.angular_pose_error, angular_error);
        io.write(&self.keys.recompute_angular_profile, self.first_rotating_cycle);
        io.write(&self.keys.rotating_in_place, true);
        self.first_rotating_cycle = false;

        self.write_orders(io, 0.0, 0.0, TargetPoseStatus::Moving);
    }

    fn complete(&mut self, io: &mut ControllersIO, path: &mut Path) {
        info!("{} [{}]: path complete", self.type_name(), self.name);

        self.write_orders(io, 0.0, 0.0, TargetPoseStatus::Reached);
        io.write(&self.keys.rotating_in_place, false);
        if let Some(ref key) = self.keys.path_complete {
            io.write(key, true);
        }
        path.stop();
    }
}

impl Controller for AdaptivePurePursuitController {
    fn type_name(&self) -> &'static str {
        "AdaptivePurePursuitController"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let shared = Arc::clone(&self.path);
        let mut path = match shared.lock() {
            Ok(p) => p,
            Err(e) => {
                error!("{} [{}]: path lock poisoned: {}", self.type_name(), self.name, e);
                return;
            }
        };

        let last = match path.poses().last() {
            Some(last) if path.is_started() => last.clone(),
            _ => {
                io.write(&self.keys.linear_speed_order, 0.0);
                io.write(&self.keys.angular_speed_order, 0.0);
                io.write(&self.keys.rotating_in_place, false);
                return;
            }
        };

        let k = &self.keys;
        let current = Pose::new(
            io.get_or(&k.current_pose_x, 0.0f64),
            io.get_or(&k.current_pose_y, 0.0f64),
            io.get_or(&k.current_pose_o, 0.0f64),
        );
        let linear_speed = io.get_or(&k.current_linear_speed, 0.0f64);
        let angular_speed = io.get_or(&k.current_angular_speed, 0.0f64);
        io.write(&k.linear_current_speed, linear_speed);
        io.write(&k.angular_current_speed, angular_speed);
        if let Some(ref key) = k.is_intermediate {
            io.write(key, last.is_intermediate);
        }

        // The whole path is driven in the direction of its last waypoint
        let direction = last.motion_direction;

        if self.needs_path_init {
            let first = path.poses()[0].clone();
            self.init_path(&first, &current, direction);
        }

        let distance_to_goal = self.distance_to_goal(path.poses(), &current);

        if self.state == PurePursuitState::RotatingToDirection {
            let error = limit_angle_deg(self.direction_angle - current.o);

            if error.abs() >= self.params.initial_rotation_threshold {
                self.write_rotation(io, error);
                return;
            }

            debug!("{} [{}]: facing the path, following it", self.type_name(), self.name);
            self.state = PurePursuitState::FollowingPath;
            self.first_rotating_cycle = true;
        }

        if self.state == PurePursuitState::FollowingPath && distance_to_goal < self.params.linear_threshold {
            if last.bypass_final_orientation {
                self.complete(io, &mut path);
                return;
            }

            debug!(
                "{} [{}]: position reached, turning to {:.1}",
                self.type_name(),
                self.name,
                last.pose.o
            );
            self.state = PurePursuitState::RotatingToFinal;
            self.first_rotating_cycle = true;
        }

        if self.state == PurePursuitState::RotatingToFinal {
            let error = limit_angle_deg(last.pose.o - current.o);

            if error.abs() < self.params.angular_threshold {
                self.complete(io, &mut path);
            }
            else {
                self.write_rotation(io, error);
            }
            return;
        }

        io.write(&self.keys.rotating_in_place, false);

        // ---- FOLLOWING ----

        let current_speed = linear_speed.abs();
        let radius = self.lookahead_distance(current_speed);
        let lookahead = self.find_lookahead_point(path.poses(), &current, radius);
        drop(path);

        let delta = lookahead - current.coords();
        let mut alpha = limit_angle_deg(delta.y.atan2(delta.x).to_degrees() - current.o);

        let backward = match direction {
            MotionDirection::ForwardOnly => false,
            MotionDirection::BackwardOnly => true,
            MotionDirection::Bidirectional => *self.locked_backward.get_or_insert(alpha.abs() > 90.0),
        };
        if backward {
            alpha = limit_angle_deg(alpha + 180.0);
        }

        let p = &self.params;
        let (sin_alpha, cos_alpha) = alpha.to_radians().sin_cos();

        // Facing away from the lookahead point: turn on the spot first
        if cos_alpha <= 0.0 {
            let speed = (0.5 * p.max_angular_speed).min((2.0 * p.angular_deceleration * alpha.abs()).sqrt());
            let angular = if alpha < 0.0 { -speed } else { speed };

            trace!("{} [{}]: alpha {:.1}, turning at {:.2}", self.type_name(), self.name, alpha, angular);
            self.write_orders(io, 0.0, angular, TargetPoseStatus::Moving);
            return;
        }

        let curvature = 2.0 * sin_alpha / delta.norm().max(MIN_CHORD_MM);

        let mut target_speed = p
            .max_linear_speed
            .min((2.0 * p.linear_deceleration * distance_to_goal).sqrt());
        if curvature.abs() > MIN_CURVATURE {
            // Keeps the angular speed within its bound
            target_speed = target_speed.min(p.max_angular_speed.to_radians() / curvature.abs());
        }

        let mut linear = if target_speed > current_speed {
            target_speed.min(current_speed + p.linear_acceleration)
        }
        else {
            target_speed
        };
        if backward {
            linear = -linear;
        }

        let angular = clamp(
            (linear.abs() * curvature).to_degrees(),
            -p.max_angular_speed,
            p.max_angular_speed,
        );

        trace!(
            "{} [{}]: lookahead ({:.1}, {:.1}) on segment {}, alpha {:.1}, orders {:.2} {:.2}",
            self.type_name(),
            self.name,
            lookahead.x,
            lookahead.y,
            self.segment_index,
            alpha,
            linear,
            angular
        );
        self.write_orders(io, linear, angular, TargetPoseStatus::Moving);
    }

    fn reset(&mut self) {
        self.state = PurePursuitState::RotatingToDirection;
        self.segment_index = 0;
        self.segment_param = 0.0;
        self.locked_backward = None;
        self.first_rotating_cycle = true;
        self.needs_path_init = true;
        self.direction_angle = 0.0;
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Intersection of the segment `[p1 p2]` with a circle, as its parameter along the segment and
/// its coordinates. Of two intersections the one closer to `p2` is returned.
fn circle_segment_intersection(
    p1: &Point2<f64>,
    p2: &Point2<f64>,
    center: &Point2<f64>,
    radius: f64,
) -> Option<(f64, Point2<f64>)> {
    let d = p2 - p1;
    let f = p1 - center;

    let a = d.norm_squared();
    let b = 2.0 * f.dot(&d);
    let c = f.norm_squared() - radius * radius;
    let discriminant = b * b - 4.0 * a * c;

    if discriminant < 0.0 || a < 1e-6 {
        return None;
    }

    let root = discriminant.sqrt();
    [(-b + root) / (2.0 * a), (-b - root) / (2.0 * a)]
        .iter()
        .copied()
        .find(|t| (0.0..=1.0).contains(t))
        .map(|t| (t, p1 + d * t))
}

#[cfg(test)]
mod test {
    use super::*;

    fn controller(params: PurePursuitParams, poses: Vec<PathPose>) -> (AdaptivePurePursuitController, SharedPath) {
        let mut path = Path::new(poses).unwrap();
        path.start();
        let path = path.shared();

        (
            AdaptivePurePursuitController::new("", PurePursuitKeys::default(), params, path.clone()),
            path,
        )
    }

    fn set_state(io: &mut ControllersIO, pose: Pose, speed: f64) {
        io.write("current_pose_x", pose.x);
        io.write("current_pose_y", pose.y);
        io.write("current_pose_O", pose.o);
        io.write("current_linear_speed", speed);
        io.write("current_angular_speed", 0.0);
    }

    fn orders(io: &ControllersIO) -> (f64, f64) {
        (
            io.get_as::<f64>("linear_speed_order").unwrap(),
            io.get_as::<f64>("angular_speed_order").unwrap(),
        )
    }

    fn directed(x: f64, y: f64, o: f64, direction: MotionDirection) -> PathPose {
        PathPose {
            motion_direction: direction,
            ..PathPose::new(x, y, o)
        }
    }

    #[test]
    fn test_lookahead_distance() {
        let (pp, _) = controller(PurePursuitParams::default(), vec![PathPose::new(1000.0, 0.0, 0.0)]);

        assert_eq!(pp.lookahead_distance(0.0), 100.0);
        assert_eq!(pp.lookahead_distance(5.0), 150.0);
        assert_eq!(pp.lookahead_distance(-5.0), 150.0);
        assert_eq!(pp.lookahead_distance(50.0), 300.0);
    }

    #[test]
    fn test_idle_without_path() {
        let (mut pp, path) = controller(PurePursuitParams::default(), vec![PathPose::new(1000.0, 0.0, 0.0)]);
        path.lock().unwrap().stop();

        let mut io = ControllersIO::new();
        io.write("linear_speed_order", 4.0);
        pp.execute(&mut io);

        assert_eq!(orders(&io), (0.0, 0.0));
        assert_eq!(io.get_as::<bool>("rotating_in_place"), Some(false));
        assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), None);
    }

    #[test]
    fn test_straight_line() {
        let (mut pp, _) = controller(PurePursuitParams::default(), vec![PathPose::new(1000.0, 0.0, 0.0)]);
        let mut io = ControllersIO::new();

        // Accelerating from rest
        set_state(&mut io, Pose::default(), 0.0);
        pp.execute(&mut io);
        assert_eq!(pp.state(), PurePursuitState::FollowingPath);
        let (linear, angular) = orders(&io);
        assert!((linear - 0.1).abs() < 1e-9);
        assert!(angular.abs() < 1e-9);
        assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), Some(TargetPoseStatus::Moving));
        assert_eq!(io.get_as::<f64>("linear_current_speed"), Some(0.0));

        // Cruising
        set_state(&mut io, Pose::new(100.0, 0.0, 0.0), 10.0);
        pp.execute(&mut io);
        assert!((orders(&io).0 - 10.0).abs() < 1e-9);

        // Braking to stop at the end: sqrt(2·0.1·50)
        set_state(&mut io, Pose::new(950.0, 0.0, 0.0), 10.0);
        pp.execute(&mut io);
        assert!((orders(&io).0 - 10f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_curvature_limits_speed() {
        let (mut pp, _) = controller(PurePursuitParams::default(), vec![PathPose::new(1000.0, 0.0, 0.0)]);
        let mut io = ControllersIO::new();

        // Lookahead point 100 mm ahead at 30° on the right: curvature 2·sin(-30°)/100
        pp.params_mut().lookahead_speed_ratio = 0.0;
        set_state(&mut io, Pose::new(0.0, 0.0, 30.0), 9.0);
        pp.execute(&mut io);

        let (linear, angular) = orders(&io);
        assert!((linear - 5f64.to_radians() / 0.01).abs() < 1e-9, "{}", linear);
        assert!((angular + 5.0).abs() < 1e-9, "{}", angular);
    }

    #[test]
    fn test_turns_on_the_spot_when_facing_away() {
        let params = PurePursuitParams {
            initial_rotation_threshold: 181.0,
            ..Default::default()
        };
        let (mut pp, _) = controller(params, vec![directed(1000.0, 0.0, 0.0, MotionDirection::ForwardOnly)]);
        let mut io = ControllersIO::new();

        set_state(&mut io, Pose::new(0.0, 0.0, 180.0), 0.0);
        pp.execute(&mut io);

        // Half the maximum angular speed, below sqrt(2·0.1·180)
        assert_eq!(pp.state(), PurePursuitState::FollowingPath);
        assert_eq!(orders(&io), (0.0, 2.5));
    }

    #[test]
    fn test_initial_rotation() {
        let (mut pp, _) =
            controller(PurePursuitParams::default(), vec![directed(0.0, 1000.0, 0.0, MotionDirection::ForwardOnly)]);
        let mut io = ControllersIO::new();

        set_state(&mut io, Pose::default(), 0.0);
        pp.execute(&mut io);
        assert_eq!(pp.state(), PurePursuitState::RotatingToDirection);
        assert_eq!(orders(&io), (0.0, 0.0));
        assert!((io.get_as::<f64>("angular_pose_error").unwrap() - 90.0).abs() < 1e-9);
        assert_eq!(io.get_as::<bool>("angular_recompute_profile"), Some(true));
        assert_eq!(io.get_as::<bool>("rotating_in_place"), Some(true));

        // The profile is only asked for once
        pp.execute(&mut io);
        assert_eq!(io.get_as::<bool>("angular_recompute_profile"), Some(false));

        // Close enough to the direction of travel
        set_state(&mut io, Pose::new(0.0, 0.0, 60.0), 0.0);
        pp.execute(&mut io);
        assert_eq!(pp.state(), PurePursuitState::FollowingPath);
        assert_eq!(io.get_as::<bool>("rotating_in_place"), Some(false));
        assert!(orders(&io).0 > 0.0);
    }

    #[test]
    fn test_backward_only() {
        let (mut pp, _) =
            controller(PurePursuitParams::default(), vec![directed(-1000.0, 0.0, 0.0, MotionDirection::BackwardOnly)]);
        let mut io = ControllersIO::new();

        // Already facing away from the target: no initial rotation, backing up straight
        set_state(&mut io, Pose::default(), 0.0);
        pp.execute(&mut io);
        assert_eq!(pp.state(), PurePursuitState::FollowingPath);
        let (linear, angular) = orders(&io);
        assert!((linear + 0.1).abs() < 1e-9);
        assert!(angular.abs() < 1e-9);
    }

    #[test]
    fn test_lookahead_moves_to_next_segment() {
        let (mut pp, _) = controller(
            PurePursuitParams::default(),
            vec![PathPose::new(500.0, 0.0, 0.0).intermediate(), PathPose::new(500.0, 500.0, 0.0)],
        );
        let mut io = ControllersIO::new();

        set_state(&mut io, Pose::default(), 0.0);
        pp.execute(&mut io);
        assert_eq!(pp.segment_index(), 0);
        assert_eq!(io.get_as::<bool>("is_intermediate"), Some(false));

        // The first waypoint is inside the lookahead circle, the point is on the second segment
        set_state(&mut io, Pose::new(450.0, 0.0, 0.0), 0.0);
        pp.execute(&mut io);
        assert_eq!(pp.segment_index(), 1);
        assert!(orders(&io).1 > 0.0);

        // Never goes back along the path
        set_state(&mut io, Pose::new(100.0, 0.0, 0.0), 0.0);
        pp.execute(&mut io);
        assert_eq!(pp.segment_index(), 1);

        pp.reset();
        assert_eq!(pp.segment_index(), 0);
        assert_eq!(pp.state(), PurePursuitState::RotatingToDirection);
    }

    #[test]
    fn test_final_rotation_and_completion() {
        let (mut pp, path) = controller(PurePursuitParams::default(), vec![PathPose::new(1000.0, 0.0, 90.0)]);
        let mut io = ControllersIO::new();

        set_state(&mut io, Pose::new(995.0, 0.0, 0.0), 0.0);
        pp.execute(&mut io);
        assert_eq!(pp.state(), PurePursuitState::RotatingToFinal);
        assert_eq!(io.get_as::<f64>("angular_pose_error"), Some(90.0));
        assert_eq!(io.get_as::<bool>("angular_recompute_profile"), Some(true));
        assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), Some(TargetPoseStatus::Moving));

        set_state(&mut io, Pose::new(995.0, 0.0, 89.0), 0.0);
        pp.execute(&mut io);
        assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), Some(TargetPoseStatus::Reached));
        assert_eq!(io.get_as::<bool>("path_complete"), Some(true));
        assert_eq!(io.get_as::<bool>("rotating_in_place"), Some(false));
        assert!(!path.lock().unwrap().is_started());
    }

    #[test]
    fn test_bypass_final_orientation() {
        let last = PathPose {
            bypass_final_orientation: true,
            ..PathPose::new(1000.0, 0.0, 90.0)
        };
        let (mut pp, path) = controller(PurePursuitParams::default(), vec![last]);
        let mut io = ControllersIO::new();

        set_state(&mut io, Pose::new(995.0, 0.0, 0.0), 0.0);
        pp.execute(&mut io);
        assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), Some(TargetPoseStatus::Reached));
        assert!(!path.lock().unwrap().is_started());
    }

    #[test]
    fn test_circle_segment_intersection() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(10.0, 0.0);

        // Two intersections, the one ahead wins
        let (t, p) = circle_segment_intersection(&a, &b, &Point2::new(5.0, 0.0), 2.0).unwrap();
        assert!((t - 0.7).abs() < 1e-9);
        assert!((p.x - 7.0).abs() < 1e-9);

        // Only the one behind is on the segment
        let (t, _) = circle_segment_intersection(&a, &b, &Point2::new(9.0, 0.0), 2.0).unwrap();
        assert!((t - 0.7).abs() < 1e-9);

        assert!(circle_segment_intersection(&a, &b, &Point2::new(5.0, 5.0), 2.0).is_none());
        assert!(circle_segment_intersection(&a, &a, &a, 2.0).is_none());
    }
}
