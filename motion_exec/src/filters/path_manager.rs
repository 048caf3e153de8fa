//! Waypoint sequencing

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, error, info};
use serde::Deserialize;

use crate::{
    ctrl::Controller,
    io::{ControllersIO, TargetPoseStatus},
    path::SharedPath,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathManagerKeys {
    pub pose_reached: String,

    pub target_pose_x: String,
    pub target_pose_y: String,
    pub target_pose_o: String,
    pub bypass_final_orientation: String,
    pub motion_direction: String,
    pub is_intermediate: String,
    pub path_index: String,
    pub path_complete: String,

    /// Pulsed when moving on to the next waypoint
    pub new_target: Option<String>,
}

/// Feeds the waypoints of the shared path to the chain.
///
/// While the path is started the current waypoint is emitted as the target pose. When an
/// intermediate waypoint is reached the path advances and the whole chain is reset so the next
/// segment starts from a clean state. When the last waypoint is reached the path is stopped and
/// `path_complete` raised.
pub struct PathManagerFilter {
    name: String,
    keys: PathManagerKeys,
    path: SharedPath,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PathManagerKeys {
    fn default() -> Self {
        Self {
            pose_reached: "pose_reached".to_string(),
            target_pose_x: "target_pose_x".to_string(),
            target_pose_y: "target_pose_y".to_string(),
            target_pose_o: "target_pose_O".to_string(),
            bypass_final_orientation: "bypass_final_orientation".to_string(),
            motion_direction: "motion_direction".to_string(),
            is_intermediate: "is_intermediate".to_string(),
            path_index: "path_index".to_string(),
            path_complete: "path_complete".to_string(),
            new_target: Some("new_target".to_string()),
        }
    }
}

impl PathManagerFilter {
    pub fn new(name: &str, keys: PathManagerKeys, path: SharedPath) -> Self {
        Self {
            name: name.to_string(),
            keys,
            path,
        }
    }

    pub fn path(&self) -> &SharedPath {
        &self.path
    }
}

impl Controller for PathManagerFilter {
    fn type_name(&self) -> &'static str {
        "PathManagerFilter"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, io: &mut ControllersIO) {
        let mut path = match self.path.lock() {
            Ok(p) => p,
            Err(e) => {
                error!("{} [{}]: path lock poisoned: {}", self.type_name(), self.name, e);
                return;
            }
        };

        if !path.is_started() || path.is_empty() {
            return;
        }

        let k = &self.keys;
        let pose_reached = io.get_as::<TargetPoseStatus>(&k.pose_reached).unwrap_or_default();

        if pose_reached == TargetPoseStatus::Reached {
            let intermediate = path.current().map(|p| p.is_intermediate).unwrap_or(false);

            if intermediate && path.advance() {
                debug!("{} [{}]: next waypoint {}", self.type_name(), self.name, path.current_index());
                io.write(&k.pose_reached, TargetPoseStatus::Moving);
                if let Some(ref key) = k.new_target {
                    io.write(key, true);
                }
                io.request_reset();
            }
            else {
                info!("{} [{}]: path complete", self.type_name(), self.name);
                io.write(&k.path_complete, true);
                path.stop();
                return;
            }
        }
        else if let Some(ref key) = k.new_target {
            io.write(key, false);
        }

        let index = path.current_index();
        if let Some(waypoint) = path.current() {
            io.write(&k.target_pose_x, waypoint.pose.x);
            io.write(&k.target_pose_y, waypoint.pose.y);
            io.write(&k.target_pose_o, waypoint.pose.o);
            io.write(&k.bypass_final_orientation, waypoint.bypass_final_orientation);
            io.write(&k.motion_direction, waypoint.motion_direction.as_i32());
            io.write(&k.is_intermediate, waypoint.is_intermediate);
            io.write(&k.path_index, index as i32);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::{MotionDirection, Path, PathPose};

    fn shared_path() -> SharedPath {
        let mut first = PathPose::new(100.0, 0.0, 0.0).intermediate();
        first.motion_direction = MotionDirection::ForwardOnly;
        let path = Path::new(vec![first, PathPose::new(100.0, 100.0, 90.0)]).unwrap();
        path.shared()
    }

    #[test]
    fn test_idle_when_not_started() {
        let mut f = PathManagerFilter::new("", PathManagerKeys::default(), shared_path());
        let mut io = ControllersIO::new();

        f.execute(&mut io);
        assert!(io.is_empty());
    }

    #[test]
    fn test_follows_path() {
        let path = shared_path();
        path.lock().unwrap().start();
        let mut f = PathManagerFilter::new("", PathManagerKeys::default(), path.clone());
        let mut io = ControllersIO::new();

        io.write("pose_reached", TargetPoseStatus::Moving);
        f.execute(&mut io);
        assert_eq!(io.get_as::<f64>("target_pose_x"), Some(100.0));
        assert_eq!(io.get_as::<f64>("target_pose_y"), Some(0.0));
        assert_eq!(io.get_as::<bool>("is_intermediate"), Some(true));
        assert_eq!(io.get_as::<i32>("motion_direction"), Some(1));
        assert_eq!(io.get_as::<i32>("path_index"), Some(0));
        assert!(!io.take_reset_request());

        // Intermediate waypoint reached: advance and reset the chain
        io.write("pose_reached", TargetPoseStatus::Reached);
        f.execute(&mut io);
        assert!(io.take_reset_request());
        assert_eq!(io.get_as::<bool>("new_target"), Some(true));
        assert_eq!(io.get_as::<f64>("target_pose_y"), Some(100.0));
        assert_eq!(io.get_as::<f64>("target_pose_O"), Some(90.0));
        assert_eq!(io.get_as::<i32>("path_index"), Some(1));
        assert_eq!(io.get_as::<TargetPoseStatus>("pose_reached"), Some(TargetPoseStatus::Moving));

        f.execute(&mut io);
        assert_eq!(io.get_as::<bool>("new_target"), Some(false));

        // Final waypoint reached: stop
        io.write("pose_reached", TargetPoseStatus::Reached);
        f.execute(&mut io);
        assert_eq!(io.get_as::<bool>("path_complete"), Some(true));
        assert!(!path.lock().unwrap().is_started());
        assert!(!io.take_reset_request());
    }
}
