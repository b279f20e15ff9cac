//! Per-fragment shading.

use nalgebra::Vector3;

use super::Light;
use crate::util::{Color, WHITE};

/// Everything a shader gets to know about a visible pixel, in world space.
#[derive(Debug, Clone, Copy)]
pub struct Fragment {
    pub position: Vector3<f32>,
    pub normal: Vector3<f32>,   // Unit length.
    pub albedo: Option<Color>,  // Interpolated vertex color, if the mesh has one.
}

/// Seam between the pipeline and the lighting model.
pub trait Shader {
    fn shade(&self, fragment: &Fragment) -> Color;
}

/// Blinn-Phong local lighting with point lights and inverse square falloff.
pub struct BlinnPhong<'a> {
    pub lights: &'a [Light],
    pub ambient: Color,
    pub specular_exponent: f32,
    pub eye: Vector3<f32>,
}

impl Shader for BlinnPhong<'_> {
    fn shade(&self, fragment: &Fragment) -> Color {
        let albedo = fragment.albedo.unwrap_or(WHITE);
        let normal = fragment.normal;
        let view_direction = (self.eye - fragment.position).try_normalize(f32::EPSILON).unwrap_or(normal);

        let mut color = self.ambient * albedo;
        for light in self.lights {
            let to_light = light.position - fragment.position;
            let distance_squared = to_light.norm_squared();
            if distance_squared <= f32::EPSILON {
                continue;
            }
            let light_direction = to_light.normalize();

            let diffuse = normal.dot(&light_direction).max(0.0);
            // Light and eye on exactly opposite sides leave no half vector.
            let specular = match (light_direction + view_direction).try_normalize(f32::EPSILON) {
                Some(half_vector) => normal.dot(&half_vector).max(0.0).powf(self.specular_exponent),
                None => 0.0,
            };
            // Same falloff for both terms.
            let attenuation = light.intensity / distance_squared;

            color += light.color * albedo * (attenuation * diffuse);
            color += light.color * (attenuation * specular);
        }
        return color;
    }
}
