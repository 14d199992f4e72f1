//! Pure numeric helpers shared by every grader.

pub use point::Point;

mod point;

/// Vectors shorter than this are treated as degenerate.
const EPSILON: f32 = 1e-6;

/// The angle at `vertex` formed by the rays to `a` and `b`, in degrees within `[0, 180]`.
///
/// Returns `None` when either ray has (near) zero length, e.g. when two joints were estimated at
/// the same position.
pub fn angle_degrees(a: Point, vertex: Point, b: Point) -> Option<f32> {
    let ray_a = a - vertex;
    let ray_b = b - vertex;
    let norm_a = ray_a.norm();
    let norm_b = ray_b.norm();

    if norm_a < EPSILON || norm_b < EPSILON {
        return None;
    }

    let cosine = (ray_a.dot(ray_b) / (norm_a * norm_b)).clamp(-1.0, 1.0);
    Some(cosine.acos().to_degrees())
}

pub fn distance(p: Point, q: Point) -> f32 {
    p.squared_distance(q).sqrt()
}

/// Mean of two left/right readings, falling back to whichever side is available.
pub fn average_optional(a: Option<f32>, b: Option<f32>) -> Option<f32> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a + b) * 0.5),
        (Some(value), None) | (None, Some(value)) => Some(value),
        (None, None) => None,
    }
}

/// The `y` coordinate of the line through `p1` and `p2` at `x = at_x`.
///
/// `None` when the line is vertical.
pub fn interpolate(p1: Point, p2: Point, at_x: f32) -> Option<f32> {
    let dx = p2.x() - p1.x();
    if dx.abs() < EPSILON {
        return None;
    }
    let t = (at_x - p1.x()) / dx;
    Some(p1.y() + t * (p2.y() - p1.y()))
}
