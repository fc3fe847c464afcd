//! Geodesic primitives for shape snapping
//!
//! Distances are haversine (via the `geo` crate). Segment projection runs in
//! lon/lat space scaled by cos(latitude), which stays well under a meter of
//! error at the segment lengths found in route shapes.

use geo::HaversineDistance;
use serde::{Deserialize, Serialize};

/// Meters in one degree of latitude
const METERS_PER_DEG_LAT: f64 = 111_132.0;

/// Coordinate tolerance (degrees) for treating a projected point as a vertex
const VERTEX_EPSILON_DEG: f64 = 1e-5;

pub const KM_PER_METER: f64 = 0.001;
pub const METERS_PER_KM: f64 = 1000.0;
pub const MILES_PER_KM: f64 = 0.621_371;
pub const KM_PER_MILE: f64 = 1.609_344;

/// A point in WGS84 coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

/// Haversine distance in meters
pub fn haversine_m(a: Point, b: Point) -> f64 {
    let p1 = geo::Point::new(a.lon, a.lat);
    let p2 = geo::Point::new(b.lon, b.lat);
    p1.haversine_distance(&p2)
}

/// Whether two points coincide within vertex-snap tolerance
pub fn approx_equal(a: Point, b: Point) -> bool {
    (a.lon - b.lon).abs() < VERTEX_EPSILON_DEG && (a.lat - b.lat).abs() < VERTEX_EPSILON_DEG
}

/// Closest on-shape position found for a fix
#[derive(Debug, Clone, Copy)]
pub struct ClosestPoint {
    /// Projected point on the shape
    pub point: Point,
    /// Haversine distance from the fix to the projected point, meters
    pub distance_m: f64,
    /// Index of the begin vertex of the segment holding the projection
    pub segment_index: usize,
}

/// Project point P onto line segment AB, returning the closest point on AB.
pub fn project_onto_segment(p: Point, a: Point, b: Point) -> Point {
    let scale_y = METERS_PER_DEG_LAT;
    let scale_x = METERS_PER_DEG_LAT * a.lat.to_radians().cos();

    let dx = (b.lon - a.lon) * scale_x;
    let dy = (b.lat - a.lat) * scale_y;
    let len_sq = dx * dx + dy * dy;

    if len_sq < 1e-12 {
        // Degenerate segment
        return a;
    }

    // t = dot(P-A, B-A) / |B-A|²  clamped to [0, 1]
    let t = (((p.lon - a.lon) * scale_x * dx + (p.lat - a.lat) * scale_y * dy) / len_sq)
        .clamp(0.0, 1.0);

    Point {
        lon: a.lon + t * (b.lon - a.lon),
        lat: a.lat + t * (b.lat - a.lat),
    }
}

/// Find the closest point on the shape for a fix, scanning segments from
/// `start_index` to the end of the shape.
///
/// When `start_index` is at or past the final vertex there are no segments
/// left to project onto; the final vertex itself is the answer.
///
/// Returns `None` only for an empty shape.
pub fn closest_point(fix: Point, shape: &[Point], start_index: usize) -> Option<ClosestPoint> {
    if shape.is_empty() {
        return None;
    }
    let last = shape.len() - 1;
    if start_index >= last {
        return Some(ClosestPoint {
            point: shape[last],
            distance_m: haversine_m(fix, shape[last]),
            segment_index: last,
        });
    }

    let mut best = ClosestPoint {
        point: shape[start_index],
        distance_m: f64::INFINITY,
        segment_index: start_index,
    };
    for i in start_index..last {
        let projected = project_onto_segment(fix, shape[i], shape[i + 1]);
        let d = haversine_m(fix, projected);
        if d < best.distance_m {
            best = ClosestPoint {
                point: projected,
                distance_m: d,
                segment_index: i,
            };
        }
    }
    Some(best)
}
