//! Screen-space coverage and barycentric coordinates.
//!
//! Both tests work on the homogenized x, y of a transformed triangle and ignore z.
//! Edge values are the z-component of `cross(edge, point - edge_start)` for the directed edges
//! a->b, b->c and c->a. Points exactly on an edge count as inside and there is no top-left rule,
//! so a pixel center lying on an edge shared by two triangles is covered by both of them.

use std::ops::{Add, Mul};

use nalgebra as na;
use na::{vector, Vector2, Vector3};
use rand::Rng;

use super::util::Triangle;

/// Triangles with a smaller absolute doubled area than this are treated as degenerate.
pub const DEGENERATE_AREA: f32 = 1e-8;

/// Z-component of the cross product of two vectors lying in the xy plane.
fn cross_z(u: Vector2<f32>, v: Vector2<f32>) -> f32 {
    return u.x * v.y - u.y * v.x;
}

/// Homogenized x, y of triangle vertices.
fn screen_points(triangle: &Triangle) -> [Vector2<f32>; 3] {
    return triangle.points().map(|p| vector![p.x, p.y]);
}

/// Doubled signed area of the triangle, positive for counter-clockwise winding.
pub fn signed_area(triangle: &Triangle) -> f32 {
    let [a, b, c] = screen_points(triangle);
    return cross_z(b - a, c - a);
}

/// Edge values of a point against edges a->b, b->c, c->a.
fn edge_values(point: Vector2<f32>, triangle: &Triangle) -> [f32; 3] {
    let [a, b, c] = screen_points(triangle);
    return [
        cross_z(b - a, point - a),
        cross_z(c - b, point - b),
        cross_z(a - c, point - c),
    ];
}

/// Checks if a point lies inside a triangle or on its boundary, for either winding.
/// Degenerate triangles cover nothing.
pub fn is_inside(point: Vector2<f32>, triangle: &Triangle) -> bool {
    if signed_area(triangle).abs() < DEGENERATE_AREA {
        return false;
    }
    let edges = edge_values(point, triangle);
    let has_positive = edges.iter().any(|&e| e > 0.0);
    let has_negative = edges.iter().any(|&e| e < 0.0);
    return !(has_positive && has_negative);
}

/// Center of a pixel, used as the single sample when antialiasing is off.
pub fn pixel_center(x: u32, y: u32) -> Vector2<f32> {
    return vector![x as f32 + 0.5, y as f32 + 0.5];
}

/// Uniformly distributed samples inside the unit square of pixel (x, y).
pub fn generate_samples<R: Rng>(x: u32, y: u32, samples: u32, rng: &mut R) -> Vec<Vector2<f32>> {
    return (0..samples)
        .map(|_| vector![x as f32 + rng.gen::<f32>(), y as f32 + rng.gen::<f32>()])
        .collect();
}

/// Fraction of random samples in the pixel (x, y) that are covered by the triangle.
/// Zero samples give zero coverage.
pub fn coverage_fraction<R: Rng>(x: u32, y: u32, triangle: &Triangle, samples: u32, rng: &mut R) -> f32 {
    if samples == 0 {
        return 0.0;
    }
    let inside = generate_samples(x, y, samples, rng)
        .into_iter()
        .filter(|&sample| is_inside(sample, triangle))
        .count();
    return inside as f32 / samples as f32;
}

/// Barycentric coordinates (alpha, beta, gamma) of a point with respect to vertices a, b, c.
/// Returns None for a degenerate triangle.
pub fn barycentric(point: Vector2<f32>, triangle: &Triangle) -> Option<Vector3<f32>> {
    let area = signed_area(triangle);
    if area.abs() < DEGENERATE_AREA {
        return None;
    }
    // Each weight is the area of the sub-triangle opposite to its vertex.
    let [ab, bc, ca] = edge_values(point, triangle);
    return Some(vector![bc / area, ca / area, ab / area]);
}

/// Weighted sum of per-vertex attributes.
pub fn interpolate<T>(weights: Vector3<f32>, attributes: [T; 3]) -> T
where
    T: Copy + Add<Output = T> + Mul<f32, Output = T>,
{
    return attributes[0] * weights.x + attributes[1] * weights.y + attributes[2] * weights.z;
}

/// Interpolated normal, renormalized since blending unit vectors doesn't keep unit length.
pub fn interpolate_normal(weights: Vector3<f32>, normals: [Vector3<f32>; 3]) -> Vector3<f32> {
    let normal = interpolate(weights, normals);
    return normal.try_normalize(f32::EPSILON).unwrap_or(normal);
}
