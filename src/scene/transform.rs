//! Builders for the four matrices of the pipeline: model, view, projection and screen space.
//!
//! All matrices act on column vectors, `p' = M * p`, so in a product the rightmost matrix is
//! applied first.

use nalgebra as na;
use na::{matrix, Matrix4, Vector3};

use super::Camera;

/// Model matrix, applying scale first, then rotation and translation last.
/// Rotation is expected to be an already built rotation matrix.
pub fn model_matrix(translation: Vector3<f32>, rotation: Matrix4<f32>, scale: Vector3<f32>) -> Matrix4<f32> {
    let translation_matrix = Matrix4::new_translation(&translation);
    let scale_matrix = Matrix4::new_nonuniform_scaling(&scale);
    return translation_matrix * rotation * scale_matrix;
}

/// View matrix moving the camera to the origin and looking down -z.
/// Camera is expected to be validated, i.e. eye != look_at and up not parallel to the view direction.
pub fn view_matrix(camera: &Camera) -> Matrix4<f32> {
    let eye = camera.position;
    let translate = Matrix4::new_translation(&(-eye));

    // New coordinate system around camera position.
    let forward = (camera.look_at - eye).normalize();
    let up = camera.up.normalize();
    let right = forward.cross(&up).normalize();
    // Up is recomputed so the basis stays orthonormal for a tilted up hint.
    let up = right.cross(&forward);
    let rotate = matrix![right.x,    right.y,    right.z,    0.0;
                         up.x,       up.y,       up.z,       0.0;
                         -forward.x, -forward.y, -forward.z, 0.0;
                         0.0,        0.0,        0.0,        1.0];

    return rotate * translate;
}

/// Perspective projection for a symmetric frustum, mapping near plane to z = 1 and far plane
/// to z = -1 after homogenization.
pub fn projection_matrix(camera: &Camera) -> Matrix4<f32> {
    // Camera looks down -z, so the clipping planes sit at negative z.
    let n = -camera.near;
    let f = -camera.far;

    let perspective = matrix![n,   0.0, 0.0,   0.0;
                              0.0, n,   0.0,   0.0;
                              0.0, 0.0, n + f, -n * f;
                              0.0, 0.0, 1.0,   0.0];

    // Scale is valid only once the view volume is centered at the origin, hence scale * translate.
    let scale = Matrix4::new_nonuniform_scaling(&Vector3::new(
        2.0 / camera.width,
        2.0 / camera.height,
        2.0 / (n - f),
    ));
    let translate = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -(f + n) / 2.0));
    let orthographic = scale * translate;

    return orthographic * perspective;
}

/// Maps NDC x, y in [-1, 1] to pixel coordinates x in [0, width], y in [0, height].
/// z is passed through unchanged.
pub fn screen_space_matrix(width: u32, height: u32) -> Matrix4<f32> {
    let w = width as f32;
    let h = height as f32;
    return matrix![w / 2.0, 0.0,     0.0, w / 2.0;
                   0.0,     h / 2.0, 0.0, h / 2.0;
                   0.0,     0.0,     1.0, 0.0;
                   0.0,     0.0,     0.0, 1.0];
}
