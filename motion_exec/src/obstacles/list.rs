//! Obstacle lists and the registry sharing them between threads

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use super::{Obstacle, ObstacleDesc, ObstacleError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of obstacles in a list.
pub const OBSTACLE_LIST_MAX_LEN: usize = 360;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of an obstacle list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleListParams {
    pub name: String,

    pub enabled: bool,

    /// Radius given to obstacles detected as points.
    ///
    /// Units: millimeters
    pub default_circle_radius: f64,

    /// Width given to obstacles detected as segments.
    ///
    /// Units: millimeters
    pub default_rectangle_width: f64,

    /// Detections closer than this are ignored.
    ///
    /// Units: millimeters
    pub min_distance: f64,

    /// Detections further than this are ignored.
    ///
    /// Units: millimeters
    pub max_distance: f64,

    /// Obstacles loaded with the list
    pub obstacles: Vec<ObstacleDesc>,
}

/// Parameters of the whole registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObstaclesParams {
    /// Playing field borders, a convex polygon in counter-clockwise order
    pub borders: Vec<[f64; 2]>,

    pub lists: Vec<ObstacleListParams>,
}

/// A named group of obstacles.
#[derive(Debug, Clone)]
pub struct ObstacleList {
    params: ObstacleListParams,
    obstacles: Vec<Obstacle>,
}

pub type SharedObstacleList = Arc<Mutex<ObstacleList>>;

/// All obstacle lists known to the avoidance.
#[derive(Debug, Clone, Default)]
pub struct ObstacleRegistry {
    lists: Vec<SharedObstacleList>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ObstacleListParams {
    fn default() -> Self {
        Self {
            name: String::from("obstacles"),
            enabled: true,
            default_circle_radius: 100.0,
            default_rectangle_width: 50.0,
            min_distance: 0.0,
            max_distance: 3000.0,
            obstacles: Vec::new(),
        }
    }
}

impl ObstacleList {
    /// Create a list, loading the obstacles described in the parameters.
    pub fn new(params: ObstacleListParams) -> Result<Self, ObstacleError> {
        let mut list = Self {
            obstacles: Vec::with_capacity(params.obstacles.len()),
            params,
        };

        let descs = list.params.obstacles.clone();
        for desc in descs.iter() {
            list.push(Obstacle::from_desc(desc)?)?;
        }

        Ok(list)
    }

    pub fn name(&self) -> &str {
        &self.params.name
    }

    pub fn params(&self) -> &ObstacleListParams {
        &self.params
    }

    pub fn is_enabled(&self) -> bool {
        self.params.enabled
    }

    /// Enable or disable the list, a disabled list is invisible to the collision queries.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.params.enabled = enabled;
    }

    pub fn push(&mut self, obstacle: Obstacle) -> Result<(), ObstacleError> {
        if self.obstacles.len() >= OBSTACLE_LIST_MAX_LEN {
            return Err(ObstacleError::ListFull(self.params.name.clone(), OBSTACLE_LIST_MAX_LEN));
        }

        self.obstacles.push(obstacle);
        Ok(())
    }

    /// Add a circle of the default radius at a detected point.
    ///
    /// Returns `false` if the detection distance is outside of the list's detection range.
    pub fn push_detection(&mut self, point: Point2<f64>, distance: f64) -> Result<bool, ObstacleError> {
        if distance < self.params.min_distance || distance > self.params.max_distance {
            return Ok(false);
        }

        self.push(Obstacle::circle(point.x, point.y, self.params.default_circle_radius)?)?;
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.obstacles.clear();
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Obstacle> {
        self.obstacles.get(index)
    }
}

impl ObstacleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry and all its lists from parameters.
    pub fn from_params(params: &ObstaclesParams) -> Result<Self, ObstacleError> {
        let mut registry = Self::new();

        for list_params in params.lists.iter() {
            registry.register(ObstacleList::new(list_params.clone())?)?;
        }

        Ok(registry)
    }

    /// Add a list, returning the handle through which it is updated.
    pub fn register(&mut self, list: ObstacleList) -> Result<SharedObstacleList, ObstacleError> {
        if self.find(list.name()).is_some() {
            return Err(ObstacleError::DuplicateList(list.name().to_string()));
        }

        debug!("Registering obstacle list {} ({} obstacles)", list.name(), list.len());

        let shared = Arc::new(Mutex::new(list));
        self.lists.push(shared.clone());
        Ok(shared)
    }

    pub fn find(&self, name: &str) -> Option<SharedObstacleList> {
        self.lists
            .iter()
            .find(|l| l.lock().map(|l| l.name() == name).unwrap_or(false))
            .cloned()
    }

    /// Handle on the named list.
    pub fn list(&self, name: &str) -> Result<SharedObstacleList, ObstacleError> {
        self.find(name).ok_or_else(|| ObstacleError::UnknownList(name.to_string()))
    }

    pub fn lists(&self) -> &[SharedObstacleList] {
        &self.lists
    }

    /// Lock every enabled list, in registration order.
    ///
    /// Poisoned lists are skipped with a warning.
    pub fn lock_enabled(&self) -> Vec<MutexGuard<'_, ObstacleList>> {
        self.lists
            .iter()
            .filter_map(|l| match l.lock() {
                Ok(guard) => Some(guard),
                Err(_) => {
                    warn!("Skipping a poisoned obstacle list");
                    None
                }
            })
            .filter(|l| l.is_enabled())
            .collect()
    }

    /// Returns `true` if `p` is inside any enabled obstacle other than `filter`.
    pub fn is_point_in_obstacles(&self, p: &Point2<f64>, filter: Option<&Obstacle>) -> bool {
        is_point_in_any(&self.lock_enabled(), p, filter)
    }

    /// Number of obstacles across enabled lists.
    pub fn count(&self) -> usize {
        self.lock_enabled().iter().map(|l| l.len()).sum()
    }

    /// All obstacles of enabled lists as JSON descriptions.
    pub fn to_json(&self) -> serde_json::Value {
        let descs: Vec<ObstacleDesc> = self
            .lock_enabled()
            .iter()
            .flat_map(|l| l.iter().map(Obstacle::to_desc).collect::<Vec<_>>())
            .collect();

        serde_json::json!(descs)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Returns `true` if `p` is inside any obstacle of the locked lists other than `filter`.
///
/// The filter is compared by address, so it must be borrowed from one of the lists.
pub fn is_point_in_any(lists: &[MutexGuard<'_, ObstacleList>], p: &Point2<f64>, filter: Option<&Obstacle>) -> bool {
    lists
        .iter()
        .flat_map(|l| l.iter())
        .filter(|o| !filter.map(|f| std::ptr::eq(*o, f)).unwrap_or(false))
        .any(|o| o.is_point_inside(p))
}
