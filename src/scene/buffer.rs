use nalgebra::Matrix4;

use super::transform::{model_matrix, projection_matrix, screen_space_matrix, view_matrix};
use super::Scene;

/// Matrix state of a frame: one model matrix per mesh instance plus view, projection and
/// screen space transforms shared by everything drawn in the frame.
/// Everything here is rebuilt from the scene by `prepare`, nothing survives between frames.
#[derive(Default)]
pub struct Buffer {
    pub model: Vec<Matrix4<f32>>,    // Indexed like scene meshes.
    pub view: Matrix4<f32>,          // World to camera space.
    pub projection: Matrix4<f32>,    // Camera space to NDC (before homogenization).
    pub screen_space: Matrix4<f32>,  // NDC to pixel coordinates.
}

impl Buffer {
    /// Builds all matrices for the frame.
    /// Scene is expected to be validated.
    pub fn prepare(&mut self, scene: &Scene) {
        self.model.clear();
        for mesh in &scene.meshes {
            let rotation = mesh.rotation.to_matrix().unwrap_or_else(Matrix4::identity);
            self.model.push(model_matrix(mesh.translation, rotation, mesh.scale));
        }
        self.view = view_matrix(&scene.camera);
        self.projection = projection_matrix(&scene.camera);
        self.screen_space = screen_space_matrix(scene.width, scene.height);
    }

    /// Camera space to pixel coordinates.
    pub fn sp_matrix(&self) -> Matrix4<f32> {
        return self.screen_space * self.projection;
    }
}
