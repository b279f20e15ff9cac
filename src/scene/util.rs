use nalgebra as na;
use na::{vector, Matrix4, Vector3, Vector4};

use crate::util::Color;

/// Transformation of a point to homogenous coordinates.
pub fn to_hom_point(v: Vector3<f32>) -> Vector4<f32> {
    return vector![v.x, v.y, v.z, 1.0];
}

/// Transformation of a vector to homogenous coordinates.
pub fn to_hom_vector(v: Vector3<f32>) -> Vector4<f32> {
    return vector![v.x, v.y, v.z, 0.0];
}

/// Transformation of a point from homogenous coordinates.
pub fn from_hom_point(v: Vector4<f32>) -> Vector3<f32> {
    return vector![v.x / v.w, v.y / v.w, v.z / v.w];
}

/// Transformation of a vector from homogenous coordinates.
pub fn from_hom_vector(v: Vector4<f32>) -> Vector3<f32> {
    return vector![v.x, v.y, v.z];
}

/// Triangle as it moves through the pipeline.
/// Positions are homogenous and live in whatever space the last applied transform produced.
/// `points` divides by w on every call, `homogenize` bakes the division in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub pos: [Vector4<f32>; 3],
    pub normal: [Vector3<f32>; 3],
    pub color: Option<[Color; 3]>,
}

impl Triangle {
    pub fn new(pos: [Vector3<f32>; 3], normal: [Vector3<f32>; 3]) -> Self {
        return Self {
            pos: pos.map(to_hom_point),
            normal,
            color: None,
        };
    }

    pub fn with_color(mut self, color: [Color; 3]) -> Self {
        self.color = Some(color);
        return self;
    }

    /// Divides x, y, z of every position by its w.
    pub fn homogenize(&self) -> Self {
        return Self {
            pos: self.pos.map(|p| to_hom_point(from_hom_point(p))),
            ..*self
        };
    }

    /// Applies transform to positions only, normals are left untouched.
    pub fn transform(&self, matrix: &Matrix4<f32>) -> Self {
        return Self {
            pos: self.pos.map(|p| matrix * p),
            ..*self
        };
    }

    /// Applies inverse transpose of a model matrix to normals and renormalizes them.
    pub fn transform_normals(&self, it_matrix: &Matrix4<f32>) -> Self {
        return Self {
            normal: self.normal.map(|n| {
                let t_n = from_hom_vector(it_matrix * to_hom_vector(n));
                t_n.try_normalize(f32::EPSILON).unwrap_or(t_n)
            }),
            ..*self
        };
    }

    /// Cartesian positions, homogenized.
    pub fn points(&self) -> [Vector3<f32>; 3] {
        return self.pos.map(from_hom_point);
    }

    /// False if any position went to infinity or NaN, e.g. a vertex sitting on the camera plane.
    pub fn is_finite(&self) -> bool {
        return self
            .points()
            .iter()
            .all(|p| p.iter().all(|value| value.is_finite()));
    }
}
