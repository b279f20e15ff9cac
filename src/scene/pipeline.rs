//! Per-frame driver: transforms every triangle through model, view, projection and screen
//! space, then rasterizes it in one of two modes.
//!
//! Shaded mode runs two full passes over all triangles. The first one only resolves depth,
//! the second one shades a pixel for the triangle whose depth equals the final buffer value,
//! so every pixel gets shaded exactly once by the visible surface. Coverage mode writes the
//! flat mesh color with optional supersampling and no depth test.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use tracing::{debug, info, trace, warn};

use super::buffer::Buffer;
use super::depth::{depth_at, resolve_depth, DEPTH_SENTINEL};
use super::raster::{barycentric, coverage_fraction, interpolate, interpolate_normal, is_inside, pixel_center};
use super::shader::{BlinnPhong, Fragment, Shader};
use super::util::Triangle;
use super::Scene;
use crate::frame::{DepthBuffer, Frame, Image};
use crate::util::{Color, BLACK};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Depth tested Blinn-Phong.
    #[default]
    Shaded,
    /// Flat color per mesh, no depth test.
    Coverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiAlias {
    /// One sample in the pixel center.
    #[default]
    None,
    /// Random samples inside the pixel, color scaled by covered fraction.
    Ssaa,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub mode: RenderMode,
    #[serde(default)]
    pub antialias: AntiAlias,
    #[serde(default = "default_samples_per_pixel")]
    pub samples_per_pixel: u32,
    /// Seed for supersampling, random if not set.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_samples_per_pixel() -> u32 {
    return 16;
}

impl Default for RenderConfig {
    fn default() -> Self {
        return Self {
            mode: RenderMode::default(),
            antialias: AntiAlias::default(),
            samples_per_pixel: default_samples_per_pixel(),
            seed: None,
        };
    }
}

/// Triangle after all transforms, keeping what later stages need from earlier spaces.
#[derive(Debug, Clone, Copy)]
pub struct StagedTriangle {
    pub world: Triangle,            // Model transform applied, used for shading.
    pub view_depths: Vector3<f32>,  // Camera space z of each vertex, used for the depth test.
    pub screen: Triangle,           // Pixel coordinates, homogenized.
    pub color: Color,               // Flat color of the mesh.
}

/// Pixel range of a triangle clamped to the frame, both ends inclusive.
#[derive(Debug, PartialEq)]
struct BoundingBox {
    ll: (u32, u32), // lower left corner
    ur: (u32, u32), // upper right corner
}

/// Pixels whose unit square can touch the triangle. None if the triangle is off screen.
fn get_triangle_bounding_box(screen: &Triangle, width: u32, height: u32) -> Option<BoundingBox> {
    let points = screen.points();
    let min_x = points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let max_x = points.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_y = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
    if max_x < 0.0 || max_y < 0.0 || min_x >= width as f32 || min_y >= height as f32 {
        return None;
    }
    return Some(BoundingBox {
        ll: (min_x.floor().max(0.0) as u32, min_y.floor().max(0.0) as u32),
        ur: (
            (max_x.floor() as u32).min(width - 1),
            (max_y.floor() as u32).min(height - 1),
        ),
    });
}

/// The pipeline driver.
pub struct Rasterizer {
    pub buffer: Buffer,
    pub config: RenderConfig,
    rng: StdRng,
}

impl Rasterizer {
    pub fn new(config: RenderConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        return Self {
            buffer: Buffer::default(),
            config,
            rng,
        };
    }

    /// Renders a frame. `meshes` holds model space triangles for every scene mesh instance,
    /// in the same order.
    pub fn render(&mut self, scene: &Scene, meshes: &[Vec<Triangle>]) -> Frame {
        self.buffer.prepare(scene);
        let staged = self.stage_triangles(scene, meshes);
        info!(
            triangles = staged.len(),
            mode = ?self.config.mode,
            antialias = ?self.config.antialias,
            "Rendering {}x{} frame",
            scene.width,
            scene.height
        );

        let mut frame = Frame {
            image: Image::new(scene.width, scene.height),
            depth: DepthBuffer::new(scene.width, scene.height, DEPTH_SENTINEL),
        };
        match self.config.mode {
            RenderMode::Shaded => {
                if self.config.antialias != AntiAlias::None {
                    warn!("Supersampling is only used in coverage mode, shading pixel centers");
                }
                self.depth_pass(&staged, &mut frame.depth);
                let shader = BlinnPhong {
                    lights: &scene.lights,
                    ambient: scene.ambient,
                    specular_exponent: scene.specular_exponent,
                    eye: scene.camera.position,
                };
                self.shade_pass(&staged, &frame.depth, &shader, &mut frame.image);
            }
            RenderMode::Coverage => self.coverage_pass(&staged, &mut frame.image),
        }
        return frame;
    }

    /// Runs every triangle through model, view, projection and screen space transforms.
    /// Meshes with a singular model matrix and triangles that can't be projected are skipped.
    pub fn stage_triangles(&self, scene: &Scene, meshes: &[Vec<Triangle>]) -> Vec<StagedTriangle> {
        let sp_matrix = self.buffer.sp_matrix();
        let mut staged = Vec::new();
        for (i, (triangles, model)) in meshes.iter().zip(&self.buffer.model).enumerate() {
            // Normals are transformed by the inverse transpose to stay perpendicular to the surface.
            let it_model = match model.try_inverse() {
                Some(inverse) => inverse.transpose(),
                None => {
                    warn!(mesh = i, "Model matrix is singular, skipping mesh");
                    continue;
                }
            };
            let color = scene.meshes.get(i).map(|mesh| mesh.color).unwrap_or_default();

            for triangle in triangles {
                let world = triangle.transform(model).transform_normals(&it_model);
                let view = world.transform(&self.buffer.view);
                let screen = view.transform(&sp_matrix).homogenize();
                if !screen.is_finite() {
                    trace!(mesh = i, "Triangle touches the camera plane, skipping");
                    continue;
                }
                let view_points = view.points();
                staged.push(StagedTriangle {
                    world,
                    view_depths: Vector3::new(view_points[0].z, view_points[1].z, view_points[2].z),
                    screen,
                    color,
                });
            }
        }
        return staged;
    }

    /// First pass of the shaded mode, fills the depth buffer with the closest surfaces.
    pub fn depth_pass(&self, staged: &[StagedTriangle], depth: &mut DepthBuffer) {
        let mut updates = 0usize;
        for triangle in staged {
            let bbox = match get_triangle_bounding_box(&triangle.screen, depth.width, depth.height) {
                Some(bbox) => bbox,
                None => continue,
            };
            for x in bbox.ll.0..=bbox.ur.0 {
                for y in bbox.ll.1..=bbox.ur.1 {
                    if self.update_depth_at_pixel(x, y, triangle, depth) {
                        updates += 1;
                    }
                }
            }
        }
        debug!(updates, "Depth pass done");
    }

    /// Depth test of one triangle at the pixel center. Returns true if the buffer was updated.
    pub fn update_depth_at_pixel(&self, x: u32, y: u32, triangle: &StagedTriangle, depth: &mut DepthBuffer) -> bool {
        return match depth_at(pixel_center(x, y), &triangle.screen, triangle.view_depths) {
            Some(candidate) => resolve_depth(depth, x, y, candidate),
            None => false,
        };
    }

    /// Second pass of the shaded mode. Expects the depth pass over the same triangles to be
    /// complete, otherwise pixels can be shaded by a surface that is hidden later.
    pub fn shade_pass<S: Shader>(&self, staged: &[StagedTriangle], depth: &DepthBuffer, shader: &S, image: &mut Image) {
        let mut shaded = 0usize;
        for triangle in staged {
            let bbox = match get_triangle_bounding_box(&triangle.screen, image.width, image.height) {
                Some(bbox) => bbox,
                None => continue,
            };
            for x in bbox.ll.0..=bbox.ur.0 {
                for y in bbox.ll.1..=bbox.ur.1 {
                    if let Some(color) = self.shade_at_pixel(x, y, triangle, depth, shader) {
                        image.set(x, y, color);
                        shaded += 1;
                    }
                }
            }
        }
        debug!(shaded, "Shade pass done");
    }

    /// Shades the pixel if the triangle is the visible surface there.
    pub fn shade_at_pixel<S: Shader>(
        &self,
        x: u32,
        y: u32,
        triangle: &StagedTriangle,
        depth: &DepthBuffer,
        shader: &S,
    ) -> Option<Color> {
        let center = pixel_center(x, y);
        // Same computation as in the depth pass, so the winner compares exactly equal.
        let candidate = depth_at(center, &triangle.screen, triangle.view_depths)?;
        if candidate != depth.get(x, y) {
            return None;
        }
        // @OPTI weights were already computed inside depth_at.
        let weights = barycentric(center, &triangle.screen)?;
        let fragment = Fragment {
            position: interpolate(weights, triangle.world.points()),
            normal: interpolate_normal(weights, triangle.world.normal),
            albedo: triangle.world.color.map(|colors| interpolate(weights, colors)),
        };
        return Some(shader.shade(&fragment));
    }

    /// Flat color rasterization without depth test, later triangles overwrite earlier ones.
    pub fn coverage_pass(&mut self, staged: &[StagedTriangle], image: &mut Image) {
        let mut drawn = 0usize;
        for triangle in staged {
            let bbox = match get_triangle_bounding_box(&triangle.screen, image.width, image.height) {
                Some(bbox) => bbox,
                None => continue,
            };
            for x in bbox.ll.0..=bbox.ur.0 {
                for y in bbox.ll.1..=bbox.ur.1 {
                    if self.draw_pixel(x, y, triangle, image) {
                        drawn += 1;
                    }
                }
            }
        }
        debug!(drawn, "Coverage pass done");
    }

    /// Writes the triangle color to the pixel if it's covered. With supersampling the color is
    /// scaled by the covered fraction, partial coverage of several triangles isn't accumulated.
    pub fn draw_pixel(&mut self, x: u32, y: u32, triangle: &StagedTriangle, image: &mut Image) -> bool {
        let color = flat_color(x, y, triangle);
        match self.config.antialias {
            AntiAlias::None => {
                if !is_inside(pixel_center(x, y), &triangle.screen) {
                    return false;
                }
                image.set(x, y, color);
            }
            AntiAlias::Ssaa => {
                let fraction = coverage_fraction(x, y, &triangle.screen, self.config.samples_per_pixel, &mut self.rng);
                if fraction <= 0.0 {
                    return false;
                }
                image.set(x, y, Color::blend(color, BLACK, fraction));
            }
        }
        return true;
    }
}

/// Mesh color, or vertex colors interpolated at the pixel center if the triangle has them.
fn flat_color(x: u32, y: u32, triangle: &StagedTriangle) -> Color {
    let vertex_colors = match triangle.world.color {
        Some(colors) => colors,
        None => return triangle.color,
    };
    return match barycentric(pixel_center(x, y), &triangle.screen) {
        Some(weights) => interpolate(weights, vertex_colors),
        None => triangle.color,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::WHITE;
    use nalgebra::vector;

    const EPS: f32 = 1e-4;

    /// Camera at z = 10 looking at the origin with a 90 degree field of view, so a point at
    /// distance d from the camera and offset x lands on NDC x / d, i.e. pixel 10 * (x / d + 1).
    fn scene_json(mode: &str, antialias: &str, meshes: &str) -> String {
        return format!(
            r#"{{
                "width": 20, "height": 20,
                "camera": {{ "position": [0, 0, 10], "look_at": [0, 0, 0], "up": [0, 1, 0],
                             "near": 1, "far": 100, "width": 2, "height": 2 }},
                "lights": [{{ "position": [0, 0, 20], "color": [1, 1, 1], "intensity": 400 }}],
                "ambient": [0.0, 0.0, 0.0],
                "specular_exponent": 1,
                "render": {{ "mode": "{mode}", "antialias": "{antialias}", "samples_per_pixel": 64, "seed": 9 }},
                "meshes": [{meshes}]
            }}"#,
            mode = mode,
            antialias = antialias,
            meshes = meshes
        );
    }

    /// Square (two triangles, split along x = y) at world z, facing the camera.
    fn square(z: f32, half: f32, color: [f32; 3]) -> String {
        return format!(
            r#"{{ "source": {{ "triangles": [
                {{ "positions": [[-{h}, -{h}, {z}], [{h}, -{h}, {z}], [{h}, {h}, {z}]],
                   "normals": [[0, 0, 1], [0, 0, 1], [0, 0, 1]] }},
                {{ "positions": [[-{h}, -{h}, {z}], [{h}, {h}, {z}], [-{h}, {h}, {z}]],
                   "normals": [[0, 0, 1], [0, 0, 1], [0, 0, 1]] }}
              ] }}, "color": [{r}, {g}, {b}] }}"#,
            h = half,
            z = z,
            r = color[0],
            g = color[1],
            b = color[2]
        );
    }

    fn render(json: &str) -> (Scene, Frame) {
        let scene = Scene::from_json_str(json).unwrap();
        let meshes = scene.load_meshes().unwrap();
        let mut rasterizer = Rasterizer::new(scene.render.clone());
        let frame = rasterizer.render(&scene, &meshes);
        return (scene, frame);
    }

    #[test]
    fn bounding_box_is_clamped_to_frame() {
        let screen = Triangle::new(
            [vector![-3.0, 2.5, 0.0], vector![7.2, 1.0, 0.0], vector![3.0, 30.0, 0.0]],
            [Vector3::z(); 3],
        );
        let bbox = get_triangle_bounding_box(&screen, 5, 10).unwrap();
        assert_eq!(bbox, BoundingBox { ll: (0, 1), ur: (4, 9) });

        let off_screen = Triangle::new(
            [vector![-3.0, -2.0, 0.0], vector![-1.0, -1.0, 0.0], vector![-2.0, -5.0, 0.0]],
            [Vector3::z(); 3],
        );
        assert!(get_triangle_bounding_box(&off_screen, 5, 10).is_none());
    }

    #[test]
    fn staged_triangles_carry_view_depth() {
        let scene = Scene::from_json_str(&scene_json("shaded", "none", &square(-2.0, 5.0, [1.0, 1.0, 1.0]))).unwrap();
        let meshes = scene.load_meshes().unwrap();
        let mut rasterizer = Rasterizer::new(scene.render.clone());
        rasterizer.buffer.prepare(&scene);
        let staged = rasterizer.stage_triangles(&scene, &meshes);
        assert_eq!(staged.len(), 2);
        // World z = -2 seen from z = 10 is 12 units in front of the camera.
        assert!((staged[0].view_depths - Vector3::repeat(-12.0)).norm() < EPS);
        assert!(staged[0].screen.is_finite());
    }

    #[test]
    fn closer_square_wins_in_either_order() {
        let near = square(2.0, 5.0, [1.0, 0.0, 0.0]);
        let far = square(-3.0, 5.0, [0.0, 1.0, 0.0]);
        for meshes in [format!("{}, {}", near, far), format!("{}, {}", far, near)] {
            let (_, frame) = render(&scene_json("shaded", "none", &meshes));
            // Both squares cover these pixels, the closer one sits at view depth 2 - 10 = -8.
            assert!((frame.depth.get(10, 10) + 8.0).abs() < EPS);
            assert!((frame.depth.get(7, 13) + 8.0).abs() < EPS);
        }
    }

    #[test]
    fn shading_uses_winning_surface() {
        let near = square(2.0, 5.0, [1.0, 0.0, 0.0]);
        let far = square(-3.0, 5.0, [0.0, 1.0, 0.0]);
        let (scene, frame) = render(&scene_json("shaded", "none", &format!("{}, {}", far, near)));

        // Pixel (10, 10) center is NDC (0.05, 0.05), on the near square 8 units away.
        let pixel = frame.image.get(10, 10);
        let center = vector![0.4, 0.4, 2.0];
        let shader = BlinnPhong {
            lights: &scene.lights,
            ambient: scene.ambient,
            specular_exponent: scene.specular_exponent,
            eye: scene.camera.position,
        };
        let expected = shader.shade(&Fragment {
            position: center,
            normal: Vector3::z(),
            albedo: None,
        });
        assert!((pixel.r - expected.r).abs() < 1e-3, "{:?} vs {:?}", pixel, expected);
        assert!(pixel.r > 0.0);
    }

    #[test]
    fn empty_pixels_keep_sentinel_and_black() {
        // Small triangle in the middle of the screen.
        let tiny = r#"{ "source": { "triangles": [
            { "positions": [[0, 0, 0], [2, 0, 0], [0, 2, 0]],
              "normals": [[0, 0, 1], [0, 0, 1], [0, 0, 1]] } ] } }"#;
        let (_, frame) = render(&scene_json("shaded", "none", tiny));
        assert_eq!(frame.depth.get(0, 0), DEPTH_SENTINEL);
        assert_eq!(frame.image.get(0, 0), BLACK);
        assert!((frame.depth.get(10, 10) + 10.0).abs() < EPS);
    }

    #[test]
    fn coverage_mode_writes_flat_color() {
        let (_, frame) = render(&scene_json("coverage", "none", &square(0.0, 5.0, [0.2, 0.4, 0.6])));
        // 10x10 world square at distance 10 covers pixels 5 to 14 in both directions.
        assert_eq!(frame.image.get(7, 12), Color::new(0.2, 0.4, 0.6));
        assert_eq!(frame.image.get(14, 5), Color::new(0.2, 0.4, 0.6));
        assert_eq!(frame.image.get(4, 10), BLACK);
        assert_eq!(frame.image.get(19, 19), BLACK);
    }

    #[test]
    fn coverage_mode_interpolates_vertex_colors() {
        let mesh = r#"{ "source": { "triangles": [
            { "positions": [[-5, -5, 0], [5, -5, 0], [5, 5, 0]],
              "normals": [[0, 0, 1], [0, 0, 1], [0, 0, 1]],
              "colors": [[1, 0, 0], [1, 0, 0], [1, 0, 0]] } ] } }"#;
        let (_, frame) = render(&scene_json("coverage", "none", mesh));
        let color = frame.image.get(13, 7);
        assert!((color.r - 1.0).abs() < EPS);
        assert!(color.g.abs() < EPS);
    }

    #[test]
    fn supersampling_softens_edges_only() {
        // Square edges land on pixel x = 4.5 and x = 15.5.
        let (_, frame) = render(&scene_json("coverage", "ssaa", &square(0.0, 5.5, [1.0, 1.0, 1.0])));
        // Interior pixel away from the diagonal is fully covered by one triangle.
        assert_eq!(frame.image.get(12, 8), WHITE);
        let edge = frame.image.get(4, 10);
        assert!(edge.r > 0.2 && edge.r < 0.8, "edge = {:?}", edge);
        assert_eq!(frame.image.get(3, 10), BLACK);
    }

    #[test]
    fn supersampling_with_same_seed_is_reproducible() {
        let json = scene_json("coverage", "ssaa", &square(0.0, 5.5, [1.0, 1.0, 1.0]));
        let (_, a) = render(&json);
        let (_, b) = render(&json);
        assert_eq!(a.image.as_rgb8_data(), b.image.as_rgb8_data());
    }

    #[test]
    fn singular_model_matrix_skips_mesh() {
        let mesh = r#"{ "source": { "triangles": [
            { "positions": [[-5, -5, 0], [5, -5, 0], [5, 5, 0]],
              "normals": [[0, 0, 1], [0, 0, 1], [0, 0, 1]] } ] }, "scale": [0, 1, 1] }"#;
        let (_, frame) = render(&scene_json("shaded", "none", mesh));
        assert_eq!(frame.depth.get(13, 7), DEPTH_SENTINEL);
    }
}
