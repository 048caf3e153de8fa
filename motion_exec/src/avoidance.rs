//! # Obstacle avoidance
//!
//! Builds a visibility graph over the bounding box vertices of the obstacles and searches it for
//! the shortest route between the robot and its target with Dijkstra's algorithm.
//!
//! Vertex 0 of the graph is the start and vertex 1 the finish, the others are the candidate
//! waypoints. The adjacency of each vertex is stored as a bitmap, which bounds the graph to
//! [`AVOIDANCE_GRAPH_MAX_VERTICES`] vertices.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, trace, warn};
use nalgebra::Point2;
use serde_json::json;

use crate::{
    loc::Pose,
    obstacles::{is_point_in_any, Obstacle, ObstacleError, ObstacleRegistry, ObstaclesParams},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of vertices in the graph, start and finish included.
pub const AVOIDANCE_GRAPH_MAX_VERTICES: usize = 64;

const START_INDEX: usize = 0;
const FINISH_INDEX: usize = 1;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Avoidance graph and the last route computed on it.
#[derive(Debug)]
pub struct Avoidance {
    registry: ObstacleRegistry,

    /// Playing field limits
    borders: Obstacle,

    /// Graph vertices, start and finish first
    valid_points: Vec<Point2<f64>>,

    /// Bit `j` of `graph[i]` is set if vertex `j` is visible from vertex `i`
    graph: [u64; AVOIDANCE_GRAPH_MAX_VERTICES],

    /// Next vertex on the route from each vertex of the route
    child: Vec<Option<usize>>,

    start: Pose,
    finish: Pose,
    computed: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AvoidanceError {
    #[error("Invalid borders: {0}")]
    InvalidBorders(ObstacleError),

    #[error("The target ({0:.1}, {1:.1}) is outside of the borders")]
    FinishOutsideBorders(f64, f64),

    #[error("The target ({0:.1}, {1:.1}) is inside an obstacle")]
    FinishInObstacle(f64, f64),

    #[error("No waypoint is visible from the start")]
    StartIsolated,

    #[error("The target cannot be reached from the start")]
    FinishUnreachable,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Avoidance {
    /// Create the avoidance over the obstacles of `registry`, within the convex `borders`.
    pub fn new(registry: ObstacleRegistry, borders: Vec<Point2<f64>>) -> Result<Self, AvoidanceError> {
        Ok(Self {
            registry,
            borders: Obstacle::polygon(borders).map_err(AvoidanceError::InvalidBorders)?,
            valid_points: Vec::with_capacity(AVOIDANCE_GRAPH_MAX_VERTICES),
            graph: [0; AVOIDANCE_GRAPH_MAX_VERTICES],
            child: Vec::with_capacity(AVOIDANCE_GRAPH_MAX_VERTICES),
            start: Pose::default(),
            finish: Pose::default(),
            computed: false,
        })
    }

    pub fn from_params(registry: ObstacleRegistry, params: &ObstaclesParams) -> Result<Self, AvoidanceError> {
        Self::new(
            registry,
            params.borders.iter().map(|p| Point2::new(p[0], p[1])).collect(),
        )
    }

    pub fn registry(&self) -> &ObstacleRegistry {
        &self.registry
    }

    /// Whether the last call to [`Avoidance::build_graph`] found a route.
    pub fn is_computed(&self) -> bool {
        self.computed
    }

    /// Compute the shortest route from `start` to `finish` around the obstacles.
    ///
    /// A start inside an obstacle is moved to the nearest point of that obstacle's outline.
    pub fn build_graph(&mut self, start: &Pose, finish: &Pose) -> Result<(), AvoidanceError> {
        self.computed = false;
        self.start = *start;
        self.finish = *finish;

        let finish_point = finish.coords();

        if !self.borders.is_point_inside(&finish_point) {
            return Err(AvoidanceError::FinishOutsideBorders(finish.x, finish.y));
        }

        let lists = self.registry.lock_enabled();

        let mut start_point = start.coords();
        for obstacle in lists.iter().flat_map(|l| l.iter()) {
            if obstacle.is_point_inside(&finish_point) {
                return Err(AvoidanceError::FinishInObstacle(finish.x, finish.y));
            }
            if obstacle.is_point_inside(&start_point) {
                start_point = obstacle.nearest_point(&start_point);
                debug!("Start inside an obstacle, moved to ({:.1}, {:.1})", start_point.x, start_point.y);
            }
        }
        self.start.x = start_point.x;
        self.start.y = start_point.y;

        self.valid_points.clear();
        self.valid_points.push(start_point);
        self.valid_points.push(finish_point);

        // ---- CANDIDATE WAYPOINTS ----

        'obstacles: for obstacle in lists.iter().flat_map(|l| l.iter()) {
            let center = obstacle.center();

            if !self.borders.is_point_inside(&center) || is_point_in_any(&lists, &center, Some(obstacle)) {
                continue;
            }

            for point in obstacle.default_bounding_box() {
                if !self.borders.is_point_inside(&point) || is_point_in_any(&lists, &point, None) {
                    continue;
                }

                if self.valid_points.len() >= AVOIDANCE_GRAPH_MAX_VERTICES {
                    warn!(
                        "Avoidance graph full ({} vertices), ignoring remaining waypoints",
                        AVOIDANCE_GRAPH_MAX_VERTICES
                    );
                    break 'obstacles;
                }
                self.valid_points.push(point);
            }
        }

        // ---- EDGES ----

        let count = self.valid_points.len();
        self.graph = [0; AVOIDANCE_GRAPH_MAX_VERTICES];

        for p in 0..count {
            for p2 in (p + 1)..count {
                let a = &self.valid_points[p];
                let b = &self.valid_points[p2];

                let collide = lists
                    .iter()
                    .flat_map(|l| l.iter())
                    .any(|o| o.is_segment_crossing(a, b));

                if !collide {
                    self.graph[p] |= 1 << p2;
                    self.graph[p2] |= 1 << p;
                }
            }
        }

        drop(lists);

        trace!("Avoidance graph of {} vertices", count);

        self.dijkstra()?;
        self.computed = true;
        Ok(())
    }

    /// Returns `true` if the segment from `start` to `stop` crosses an obstacle within the borders.
    pub fn check_recompute(&self, start: &Pose, stop: &Pose) -> bool {
        let a = start.coords();
        let b = stop.coords();

        self.registry
            .lock_enabled()
            .iter()
            .flat_map(|l| l.iter())
            .filter(|o| self.borders.is_point_inside(&o.center()))
            .any(|o| o.is_segment_crossing(&a, &b))
    }

    /// Pose number `index` along the route, 0 being the start.
    ///
    /// Indices past the end of the route give the finish, as does any index when no route is
    /// computed. Intermediate poses have a null orientation, the finish keeps the target's one.
    pub fn get_pose(&self, index: usize) -> Pose {
        if !self.computed {
            return self.finish;
        }

        let mut i = START_INDEX;
        let mut j = 0;

        while i != FINISH_INDEX && j < index {
            match self.child.get(i).copied().flatten() {
                Some(next) => i = next,
                None => break,
            }
            j += 1;
        }

        match i {
            START_INDEX => self.start,
            FINISH_INDEX => self.finish,
            _ => Pose::new(self.valid_points[i].x, self.valid_points[i].y, 0.0),
        }
    }

    /// Route from the start to the finish, empty when no route is computed.
    pub fn path(&self) -> Vec<Pose> {
        let mut path = Vec::new();

        if !self.computed {
            return path;
        }

        let mut index = 0;
        loop {
            let pose = self.get_pose(index);
            path.push(pose);

            if pose == self.finish || index > self.valid_points.len() {
                break;
            }
            index += 1;
        }

        path
    }

    /// Route as a JSON array of `{x, y}` objects.
    pub fn path_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.path()
                .iter()
                .map(|p| json!({"x": p.x, "y": p.y}))
                .collect(),
        )
    }

    /// Shortest path from the start to the finish.
    ///
    /// The next vertex visited is the unvisited one of least distance, the lowest index winning
    /// ties, so that a given obstacle configuration always gives the same route.
    fn dijkstra(&mut self) -> Result<(), AvoidanceError> {
        let count = self.valid_points.len();

        let mut checked = vec![false; count];
        let mut distance = vec![f64::INFINITY; count];
        let mut parent: Vec<Option<usize>> = vec![None; count];
        self.child = vec![None; count];

        distance[START_INDEX] = 0.0;
        let mut v = START_INDEX;

        if self.graph[v] == 0 {
            return Err(AvoidanceError::StartIsolated);
        }

        while v != FINISH_INDEX && !checked[v] {
            checked[v] = true;

            for i in 0..count {
                if (self.graph[v] & (1 << i)) == 0 {
                    continue;
                }

                let weight = (self.valid_points[v] - self.valid_points[i]).norm();
                if distance[i] > distance[v] + weight {
                    distance[i] = distance[v] + weight;
                    parent[i] = Some(v);
                }
            }

            let mut min_distance = f64::INFINITY;
            for i in 1..count {
                if !checked[i] && min_distance > distance[i] {
                    min_distance = distance[i];
                    v = i;
                }
            }
        }

        if parent[FINISH_INDEX].is_none() {
            return Err(AvoidanceError::FinishUnreachable);
        }

        let mut i = FINISH_INDEX;
        while let Some(p) = parent[i] {
            self.child[p] = Some(i);
            i = p;
        }

        Ok(())
    }
}
