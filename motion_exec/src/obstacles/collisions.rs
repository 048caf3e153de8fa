//! Geometric collision primitives on circles and convex polygons
//!
//! Polygons are given as a list of vertices in counter-clockwise order. Points lying exactly on a
//! polygon edge are considered outside of it, points on a circle are considered inside.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Point2, Vector2};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Tolerance on the cross product when testing collinearity.
const COLLINEAR_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

pub fn is_point_in_circle(center: &Point2<f64>, radius: f64, p: &Point2<f64>) -> bool {
    (p - center).norm_squared() <= radius * radius
}

/// Returns `true` if `p` is strictly inside the convex polygon.
pub fn is_point_in_polygon(polygon: &[Point2<f64>], p: &Point2<f64>) -> bool {
    if polygon.is_empty() {
        return false;
    }

    edges(polygon).all(|(a, b)| cross(&(b - a), &(p - a)) > 0.0)
}

/// Returns `true` if the segment `[ab]` goes through the circle.
pub fn is_segment_crossing_circle(
    a: &Point2<f64>,
    b: &Point2<f64>,
    center: &Point2<f64>,
    radius: f64,
) -> bool {
    let ab = b - a;

    // Degenerate segment
    if ab.norm_squared() == 0.0 {
        return is_point_in_circle(center, radius, a);
    }

    // Distance from the center to the line (ab)
    let ac = center - a;
    if cross(&ab, &ac).abs() / ab.norm() >= radius {
        return false;
    }

    if is_point_in_circle(center, radius, a) || is_point_in_circle(center, radius, b) {
        return true;
    }

    // The projection of the center must fall between a and b
    let bc = center - b;
    ab.dot(&ac) >= 0.0 && (-ab).dot(&bc) >= 0.0
}

/// Returns `true` if the segment `[ab]` goes through the convex polygon.
///
/// A segment running along an edge, or joining two consecutive vertices, does not cross. A
/// segment joining two non-consecutive vertices is a diagonal and crosses.
pub fn is_segment_crossing_polygon(a: &Point2<f64>, b: &Point2<f64>, polygon: &[Point2<f64>]) -> bool {
    let count = polygon.len();
    let index_a = vertex_index(polygon, a);
    let index_b = vertex_index(polygon, b);

    for (c, d) in edges(polygon) {
        if is_segment_crossing_segment(a, b, c, d) {
            return true;
        }

        if let (Some(ia), Some(ib)) = (index_a, index_b) {
            let consecutive = (ia as isize - ib as isize).abs() == 1
                || (ia == 0 && ib == count - 1)
                || (ib == 0 && ia == count - 1);

            if consecutive {
                continue;
            }
            return true;
        }

        if is_point_on_segment(a, b, c) {
            return true;
        }
    }

    false
}

/// Nearest point on the circle outline, pushed out by `clearance`.
///
/// A point at the center has no defined direction, the point on the +x side is returned.
pub fn nearest_point_on_circle(center: &Point2<f64>, radius: f64, p: &Point2<f64>, clearance: f64) -> Point2<f64> {
    let v = p - center;
    let norm = v.norm();

    let dir = if norm > 0.0 {
        v / norm
    }
    else {
        Vector2::new(1.0, 0.0)
    };

    center + dir * (radius + clearance)
}

/// Nearest vertex of the polygon, or `p` itself for an empty polygon.
pub fn nearest_polygon_vertex(polygon: &[Point2<f64>], p: &Point2<f64>) -> Point2<f64> {
    polygon
        .iter()
        .min_by(|v1, v2| {
            let d1 = (*v1 - p).norm_squared();
            let d2 = (*v2 - p).norm_squared();
            d1.partial_cmp(&d2).unwrap_or(std::cmp::Ordering::Equal)
        })
        .copied()
        .unwrap_or(*p)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Z component of the cross product of two plane vectors.
fn cross(u: &Vector2<f64>, v: &Vector2<f64>) -> f64 {
    u.x * v.y - u.y * v.x
}

/// Iterate over the edges of a polygon, including the closing one.
fn edges(polygon: &[Point2<f64>]) -> impl Iterator<Item = (&Point2<f64>, &Point2<f64>)> {
    let count = polygon.len();
    (0..count).map(move |i| (&polygon[i], &polygon[(i + 1) % count]))
}

fn vertex_index(polygon: &[Point2<f64>], p: &Point2<f64>) -> Option<usize> {
    polygon.iter().position(|v| v == p)
}

/// `c` and `d` lie strictly on both sides of the line (ab).
fn is_segment_crossing_line(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>, d: &Point2<f64>) -> bool {
    let ab = b - a;
    cross(&ab, &(d - a)) * cross(&ab, &(c - a)) < 0.0
}

fn is_segment_crossing_segment(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>, d: &Point2<f64>) -> bool {
    is_segment_crossing_line(a, b, c, d) && is_segment_crossing_line(c, d, a, b)
}

/// `c` lies on the segment `[ab]`, excluding its ends.
fn is_point_on_segment(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> bool {
    let ab = b - a;
    let ac = c - a;

    if cross(&ab, &ac).abs() > COLLINEAR_EPSILON * ab.norm().max(1.0) {
        return false;
    }

    let t = ab.dot(&ac);
    t > 0.0 && t < ab.norm_squared()
}
