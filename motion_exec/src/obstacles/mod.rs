//! # Obstacles
//!
//! Obstacles are a closed set of shapes (circle, rectangle and convex polygon) answering the same
//! collision queries. They are grouped into [`ObstacleList`]s, which are shared between the
//! threads updating them (sensors, scripts) and the avoidance through an [`ObstacleRegistry`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod collisions;
mod list;

pub use list::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of vertices of an obstacle bounding box.
pub const OBSTACLE_BOUNDING_BOX_VERTICES: usize = 6;

/// Bounding box radius margin, as a fraction of the obstacle radius.
pub const OBSTACLE_BOUNDING_BOX_MARGIN: f64 = 0.2;

/// Distance kept from a circle outline when moving a point out of it.
///
/// Units: millimeters
pub const CIRCLE_CLEARANCE_MM: f64 = 1e-3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    pub center: Point2<f64>,
    pub radius: f64,
}

/// A rectangle rotated by `angle` around its center.
#[derive(Debug, Clone, PartialEq)]
pub struct Rectangle {
    center: Point2<f64>,

    /// Units: degrees
    angle: f64,
    length_x: f64,
    length_y: f64,

    /// Vertices in counter-clockwise order
    points: [Point2<f64>; 4],
}

/// A convex polygon, vertices in counter-clockwise order.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<Point2<f64>>,
    center: Point2<f64>,
    radius: f64,
}

/// Description of an obstacle, as found in parameter files and scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ObstacleDesc {
    Circle {
        x: f64,
        y: f64,
        radius: f64,
    },
    Rectangle {
        x: f64,
        y: f64,
        #[serde(default)]
        angle: f64,
        length_x: f64,
        length_y: f64,
    },
    Polygon {
        points: Vec<[f64; 2]>,
    },
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Obstacle {
    Circle(Circle),
    Rectangle(Rectangle),
    Polygon(Polygon),
}

#[derive(Debug, thiserror::Error)]
pub enum ObstacleError {
    #[error("A polygon needs at least 3 vertices, got {0}")]
    NotEnoughVertices(usize),

    #[error("Obstacle dimensions must be positive")]
    InvalidDimensions,

    #[error("Obstacle list {0} is full ({1} obstacles)")]
    ListFull(String, usize),

    #[error("No obstacle list named {0}")]
    UnknownList(String),

    #[error("Obstacle list {0} is already registered")]
    DuplicateList(String),

    #[error("The lock on obstacle list {0} is poisoned")]
    ListPoisoned(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Circle {
    pub fn new(x: f64, y: f64, radius: f64) -> Result<Self, ObstacleError> {
        if !(radius > 0.0) {
            return Err(ObstacleError::InvalidDimensions);
        }

        Ok(Self {
            center: Point2::new(x, y),
            radius,
        })
    }
}

impl Rectangle {
    pub fn new(x: f64, y: f64, angle: f64, length_x: f64, length_y: f64) -> Result<Self, ObstacleError> {
        if !(length_x > 0.0 && length_y > 0.0) {
            return Err(ObstacleError::InvalidDimensions);
        }

        let (sin, cos) = angle.to_radians().sin_cos();
        let hx = length_x / 2.0;
        let hy = length_y / 2.0;

        let corner = |sx: f64, sy: f64| {
            Point2::new(
                x + sx * hx * cos - sy * hy * sin,
                y + sx * hx * sin + sy * hy * cos,
            )
        };

        Ok(Self {
            center: Point2::new(x, y),
            angle,
            length_x,
            length_y,
            points: [
                corner(-1.0, -1.0),
                corner(1.0, -1.0),
                corner(1.0, 1.0),
                corner(-1.0, 1.0),
            ],
        })
    }

    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn lengths(&self) -> (f64, f64) {
        (self.length_x, self.length_y)
    }
}

impl Polygon {
    pub fn new(points: Vec<Point2<f64>>) -> Result<Self, ObstacleError> {
        if points.len() < 3 {
            return Err(ObstacleError::NotEnoughVertices(points.len()));
        }

        let n = points.len() as f64;
        let center = Point2::new(
            points.iter().map(|p| p.x).sum::<f64>() / n,
            points.iter().map(|p| p.y).sum::<f64>() / n,
        );
        let radius = points
            .iter()
            .map(|p| (p - center).norm())
            .fold(0.0, f64::max);

        Ok(Self { points, center, radius })
    }

    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }
}

impl Obstacle {
    pub fn circle(x: f64, y: f64, radius: f64) -> Result<Self, ObstacleError> {
        Ok(Obstacle::Circle(Circle::new(x, y, radius)?))
    }

    pub fn rectangle(x: f64, y: f64, angle: f64, length_x: f64, length_y: f64) -> Result<Self, ObstacleError> {
        Ok(Obstacle::Rectangle(Rectangle::new(x, y, angle, length_x, length_y)?))
    }

    pub fn polygon(points: Vec<Point2<f64>>) -> Result<Self, ObstacleError> {
        Ok(Obstacle::Polygon(Polygon::new(points)?))
    }

    pub fn from_desc(desc: &ObstacleDesc) -> Result<Self, ObstacleError> {
        match desc {
            ObstacleDesc::Circle { x, y, radius } => Self::circle(*x, *y, *radius),
            ObstacleDesc::Rectangle { x, y, angle, length_x, length_y } => {
                Self::rectangle(*x, *y, *angle, *length_x, *length_y)
            }
            ObstacleDesc::Polygon { points } => {
                Self::polygon(points.iter().map(|p| Point2::new(p[0], p[1])).collect())
            }
        }
    }

    pub fn center(&self) -> Point2<f64> {
        match self {
            Obstacle::Circle(c) => c.center,
            Obstacle::Rectangle(r) => r.center,
            Obstacle::Polygon(p) => p.center,
        }
    }

    /// Radius of the circumscribed circle.
    pub fn radius(&self) -> f64 {
        match self {
            Obstacle::Circle(c) => c.radius,
            Obstacle::Rectangle(r) => r.length_x.hypot(r.length_y) / 2.0,
            Obstacle::Polygon(p) => p.radius,
        }
    }

    pub fn is_point_inside(&self, p: &Point2<f64>) -> bool {
        match self {
            Obstacle::Circle(c) => collisions::is_point_in_circle(&c.center, c.radius, p),
            Obstacle::Rectangle(r) => collisions::is_point_in_polygon(&r.points, p),
            Obstacle::Polygon(poly) => collisions::is_point_in_polygon(&poly.points, p),
        }
    }

    pub fn is_segment_crossing(&self, a: &Point2<f64>, b: &Point2<f64>) -> bool {
        match self {
            Obstacle::Circle(c) => collisions::is_segment_crossing_circle(a, b, &c.center, c.radius),
            Obstacle::Rectangle(r) => collisions::is_segment_crossing_polygon(a, b, &r.points),
            Obstacle::Polygon(poly) => collisions::is_segment_crossing_polygon(a, b, &poly.points),
        }
    }

    /// Nearest point of the obstacle outline from which the robot can leave it.
    ///
    /// For polygons this is the nearest vertex. For circles it is the point of the outline in the
    /// direction of `p`, slightly outside so it no longer counts as inside.
    pub fn nearest_point(&self, p: &Point2<f64>) -> Point2<f64> {
        match self {
            Obstacle::Circle(c) => collisions::nearest_point_on_circle(&c.center, c.radius, p, CIRCLE_CLEARANCE_MM),
            Obstacle::Rectangle(r) => collisions::nearest_polygon_vertex(&r.points, p),
            Obstacle::Polygon(poly) => collisions::nearest_polygon_vertex(&poly.points, p),
        }
    }

    /// Polygon enclosing the obstacle, used as waypoints to go around it.
    ///
    /// Rectangles use their own vertices. Other shapes use a regular polygon of `nb_vertices`
    /// (at least 4) vertices on the circumscribed circle enlarged by `radius_margin`.
    pub fn bounding_box(&self, nb_vertices: usize, radius_margin: f64) -> Vec<Point2<f64>> {
        if let Obstacle::Rectangle(r) = self {
            return r.points.to_vec();
        }

        let count = nb_vertices.max(4);
        let radius = self.radius() * (1.0 + radius_margin);
        let center = self.center();

        (0..count)
            .map(|i| {
                let a = (i as f64) * 2.0 * std::f64::consts::PI / (count as f64);
                Point2::new(center.x + radius * a.cos(), center.y + radius * a.sin())
            })
            .collect()
    }

    /// Bounding box with the default vertex count and margin.
    pub fn default_bounding_box(&self) -> Vec<Point2<f64>> {
        self.bounding_box(OBSTACLE_BOUNDING_BOX_VERTICES, OBSTACLE_BOUNDING_BOX_MARGIN)
    }

    pub fn to_desc(&self) -> ObstacleDesc {
        match self {
            Obstacle::Circle(c) => ObstacleDesc::Circle {
                x: c.center.x,
                y: c.center.y,
                radius: c.radius,
            },
            Obstacle::Rectangle(r) => ObstacleDesc::Rectangle {
                x: r.center.x,
                y: r.center.y,
                angle: r.angle,
                length_x: r.length_x,
                length_y: r.length_y,
            },
            Obstacle::Polygon(p) => ObstacleDesc::Polygon {
                points: p.points.iter().map(|v| [v.x, v.y]).collect(),
            },
        }
    }
}
