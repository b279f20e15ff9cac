//! Depth test.
//!
//! Depth values are view-space z. The camera looks down -z, so visible surfaces have negative
//! depth and the closer surface is the algebraically larger value. The sentinel has to be the
//! lowest possible value for the first real surface to replace it.

use nalgebra::{Vector2, Vector3};

use super::raster::{barycentric, interpolate, is_inside};
use super::util::Triangle;
use crate::frame::DepthBuffer;

/// Initial depth buffer value meaning "no surface yet".
pub const DEPTH_SENTINEL: f32 = f32::NEG_INFINITY;

/// True if candidate depth is in front of the stored one.
pub fn is_closer(candidate: f32, stored: f32) -> bool {
    return candidate > stored;
}

/// View-space depth at a screen point.
/// Barycentric weights come from the screen-space triangle and are applied to the view-space z
/// values of the same triangle. None if the point isn't covered or the triangle is degenerate.
pub fn depth_at(point: Vector2<f32>, screen: &Triangle, view_depths: Vector3<f32>) -> Option<f32> {
    if !is_inside(point, screen) {
        return None;
    }
    let weights = barycentric(point, screen)?;
    return Some(interpolate(weights, [view_depths.x, view_depths.y, view_depths.z]));
}

/// Updates the depth buffer at (x, y) if the candidate is closer.
/// Returns true when the buffer was updated.
pub fn resolve_depth(depth_buffer: &mut DepthBuffer, x: u32, y: u32, candidate: f32) -> bool {
    if !is_closer(candidate, depth_buffer.get(x, y)) {
        return false;
    }
    depth_buffer.set(x, y, candidate);
    return true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::vector;

    fn quad_half(depth: f32) -> (Triangle, Vector3<f32>) {
        let screen = Triangle::new(
            [vector![0.0, 0.0, 0.0], vector![4.0, 0.0, 0.0], vector![0.0, 4.0, 0.0]],
            [Vector3::z(); 3],
        );
        return (screen, vector![depth, depth, depth]);
    }

    #[test]
    fn first_surface_always_replaces_sentinel() {
        let mut depth_buffer = DepthBuffer::new(1, 1, DEPTH_SENTINEL);
        assert!(resolve_depth(&mut depth_buffer, 0, 0, -1.0e30));
        assert_eq!(depth_buffer.get(0, 0), -1.0e30);
    }

    #[test]
    fn closer_surface_wins_regardless_of_order() {
        let orders = [[-2.0, -5.0], [-5.0, -2.0]];
        for order in orders {
            let mut depth_buffer = DepthBuffer::new(2, 2, DEPTH_SENTINEL);
            for depth in order {
                let (screen, view_depths) = quad_half(depth);
                let candidate = depth_at(vector![0.5, 0.5], &screen, view_depths).unwrap();
                resolve_depth(&mut depth_buffer, 0, 0, candidate);
            }
            assert_eq!(depth_buffer.get(0, 0), -2.0);
        }
    }

    #[test]
    fn further_surface_does_not_overwrite() {
        let mut depth_buffer = DepthBuffer::new(1, 1, DEPTH_SENTINEL);
        assert!(resolve_depth(&mut depth_buffer, 0, 0, -2.0));
        assert!(!resolve_depth(&mut depth_buffer, 0, 0, -5.0));
        assert!(!resolve_depth(&mut depth_buffer, 0, 0, -2.0));
        assert_eq!(depth_buffer.get(0, 0), -2.0);
    }

    #[test]
    fn mismatched_sentinel_drops_surfaces() {
        // A sentinel above the visible depth range hides everything, which is why the sentinel
        // has to be paired with the comparison.
        let mut depth_buffer = DepthBuffer::new(1, 1, -1.1);
        assert!(!resolve_depth(&mut depth_buffer, 0, 0, -2.0));
        assert_eq!(depth_buffer.get(0, 0), -1.1);
    }

    #[test]
    fn depth_is_interpolated_in_screen_space() {
        let (screen, _) = quad_half(0.0);
        let view_depths = vector![-2.0, -6.0, -2.0];
        // Midpoint of edge a->b.
        let depth = depth_at(vector![2.0, 0.0], &screen, view_depths).unwrap();
        assert!((depth + 4.0).abs() < 1e-5);
        assert!(depth_at(vector![3.5, 3.5], &screen, view_depths).is_none());
    }
}
